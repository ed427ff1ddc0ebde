mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;

use commands::calculators::{CarryArgs, CatchUpArgs, PrefReturnArgs};
use commands::lifecycle::{ApproveArgs, ClawbackArgs, DistributeArgs};
use commands::scenarios::ScenarioArgs;
use commands::waterfall::{CalculateArgs, ShowArgs, ValidateArgs};

/// Distribution waterfall administration for closed-end funds
#[derive(Parser)]
#[command(
    name = "fundadm",
    version,
    about = "Distribution waterfall administration for closed-end funds",
    long_about = "Computes, validates and approves distribution waterfalls for closed-end \
                  funds with decimal precision. Calculations are read from and written \
                  back to a JSON fund book."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Engine config file (YAML or JSON)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Log calculation progress to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a distribution waterfall and store it as calculated
    Calculate(CalculateArgs),
    /// Model several hypothetical distributions in parallel
    Scenarios(ScenarioArgs),
    /// Show a stored calculation
    Show(ShowArgs),
    /// Re-run validation on a stored calculation
    Validate(ValidateArgs),
    /// Approve a calculated waterfall
    Approve(ApproveArgs),
    /// Mark an approved waterfall as distributed
    Distribute(DistributeArgs),
    /// Assess GP carry clawback to date
    Clawback(ClawbackArgs),
    /// Preferred return accrual
    PrefReturn(PrefReturnArgs),
    /// GP catch-up amount
    CatchUp(CatchUpArgs),
    /// Carried interest split
    Carry(CarryArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .target(env_logger::Target::Stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match input::config::load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    };

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Calculate(args) => commands::waterfall::run_calculate(args, &config),
        Commands::Scenarios(args) => commands::scenarios::run_scenarios(args, &config),
        Commands::Show(args) => commands::waterfall::run_show(args, &config),
        Commands::Validate(args) => commands::waterfall::run_validate(args, &config),
        Commands::Approve(args) => commands::lifecycle::run_approve(args, &config),
        Commands::Distribute(args) => commands::lifecycle::run_distribute(args, &config),
        Commands::Clawback(args) => commands::lifecycle::run_clawback(args, &config),
        Commands::PrefReturn(args) => commands::calculators::run_pref_return(args),
        Commands::CatchUp(args) => commands::calculators::run_catch_up(args),
        Commands::Carry(args) => commands::calculators::run_carry(args),
        Commands::Version => {
            println!("fundadm {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
