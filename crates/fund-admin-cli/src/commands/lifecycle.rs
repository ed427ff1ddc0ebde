use std::time::Instant;

use chrono::{DateTime, NaiveDate, Utc};
use clap::Args;
use serde_json::json;

use fund_admin_core::EngineConfig;

use super::{envelope, open_book, save_book, BookArgs, CommandResult};

/// Arguments for approving a calculated waterfall
#[derive(Args)]
pub struct ApproveArgs {
    #[command(flatten)]
    pub book: BookArgs,

    /// Calculation id
    #[arg(long)]
    pub id: u64,

    /// Name of the approver
    #[arg(long)]
    pub by: String,

    /// Approval timestamp (RFC 3339); defaults to now
    #[arg(long)]
    pub at: Option<DateTime<Utc>>,
}

pub fn run_approve(args: ApproveArgs, config: &EngineConfig) -> CommandResult {
    let started = Instant::now();
    let approved_at = args.at.unwrap_or_else(Utc::now);
    let service = open_book(&args.book, config)?;
    let calc = service.approve_calculation(args.id, &args.by, approved_at)?;
    save_book(&args.book, &service)?;

    envelope(
        "Approval: calculated to approved, gated on the latest validation",
        &json!({ "id": args.id, "approved_by": args.by, "approved_at": approved_at }),
        Vec::new(),
        started,
        calc,
    )
}

/// Arguments for marking an approved waterfall as paid out
#[derive(Args)]
pub struct DistributeArgs {
    #[command(flatten)]
    pub book: BookArgs,

    /// Calculation id
    #[arg(long)]
    pub id: u64,
}

pub fn run_distribute(args: DistributeArgs, config: &EngineConfig) -> CommandResult {
    let started = Instant::now();
    let service = open_book(&args.book, config)?;
    let calc = service.mark_distributed(args.id)?;
    save_book(&args.book, &service)?;

    envelope(
        "Distribution: approved to distributed, all events marked paid",
        &json!({ "id": args.id }),
        Vec::new(),
        started,
        calc,
    )
}

/// Arguments for a windup clawback assessment
#[derive(Args)]
pub struct ClawbackArgs {
    /// Path to the fund book (JSON)
    #[arg(long)]
    pub book: String,

    /// Fund to assess
    #[arg(long)]
    pub fund_id: String,

    /// Assessment date (YYYY-MM-DD)
    #[arg(long)]
    pub as_of: NaiveDate,
}

pub fn run_clawback(args: ClawbackArgs, config: &EngineConfig) -> CommandResult {
    let started = Instant::now();
    let book = BookArgs {
        book: args.book.clone(),
        save: false,
    };
    let service = open_book(&book, config)?;
    let assessment = service.assess_clawback(&args.fund_id, args.as_of)?;

    let mut warnings = Vec::new();
    if !assessment.clawback.overdistribution.is_zero() {
        warnings.push(format!(
            "GP carry over-distributed by {}",
            assessment.clawback.overdistribution
        ));
    }
    envelope(
        "Clawback: carry earned on profit to date versus carry paid",
        &json!({ "fund_id": args.fund_id, "as_of": args.as_of }),
        warnings,
        started,
        assessment,
    )
}
