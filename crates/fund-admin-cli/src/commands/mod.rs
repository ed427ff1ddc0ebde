pub mod calculators;
pub mod lifecycle;
pub mod scenarios;
pub mod waterfall;

use std::time::Instant;

use clap::Args;
use log::info;
use serde::Serialize;
use serde_json::Value;

use fund_admin_core::{with_metadata, EngineConfig, InMemoryStore, WaterfallService};

use crate::input;

pub type CommandResult = Result<Value, Box<dyn std::error::Error>>;

/// Fund book shared by every command that reads or writes stored state.
#[derive(Args)]
pub struct BookArgs {
    /// Path to the fund book (JSON: funds and calculations)
    #[arg(long)]
    pub book: String,

    /// Write the updated book back to --book
    #[arg(long)]
    pub save: bool,
}

/// Load the book into an in-memory store behind a service.
pub fn open_book(
    args: &BookArgs,
    config: &EngineConfig,
) -> Result<WaterfallService<InMemoryStore>, Box<dyn std::error::Error>> {
    let json = input::file::read_text(&args.book)?;
    let store = InMemoryStore::from_json(&json)?;
    Ok(WaterfallService::new(store, config.clone())?)
}

/// Persist the store back to the book when `--save` was given.
pub fn save_book(
    args: &BookArgs,
    service: &WaterfallService<InMemoryStore>,
) -> Result<(), Box<dyn std::error::Error>> {
    if !args.save {
        return Ok(());
    }
    let json = service.store().to_json()?;
    input::file::write_text(&args.book, &json)?;
    info!("book saved to {}", args.book);
    Ok(())
}

/// Wrap a result in the standard output envelope.
pub fn envelope<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    started: Instant,
    result: T,
) -> CommandResult {
    let elapsed_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
    let output = with_metadata(methodology, assumptions, warnings, elapsed_us, result);
    Ok(serde_json::to_value(output)?)
}
