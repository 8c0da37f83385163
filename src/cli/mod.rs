//! Command-line interface.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};

use commands::init::InitArgs;
use commands::recur::RecurArgs;
use commands::sync::SyncArgs;
use commands::xref::XrefArgs;

#[derive(Parser, Debug)]
#[command(name = "agencyflow")]
#[command(about = "Recurring-task scheduling and portal reconciliation", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the .agencyflow directory, default config and database
    Init(InitArgs),

    /// Recurring task commands
    Recur(RecurArgs),

    /// Portal reconciliation commands
    Sync(SyncArgs),

    /// Cross-reference table commands
    Xref(XrefArgs),
}

/// Print an error in the requested format and exit non-zero.
pub fn handle_error(err: anyhow::Error, json_mode: bool) -> ! {
    if json_mode {
        let chain: Vec<String> = err.chain().skip(1).map(ToString::to_string).collect();
        let body = serde_json::json!({
            "success": false,
            "error": err.to_string(),
            "causes": chain,
        });
        println!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    } else {
        eprintln!("Error: {err}");
        for cause in err.chain().skip(1) {
            eprintln!("  caused by: {cause}");
        }
    }
    std::process::exit(1);
}
