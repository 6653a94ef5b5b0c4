pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "querydesk",
    about = "Querydesk operator CLI",
    long_about = "Inspect configuration, list the query tools, invoke a tool against the configured engine, and check readiness.",
    after_help = "Examples:\n  querydesk tools\n  querydesk invoke get_inventory_status -p warehouse_id=WH001\n  querydesk doctor --json"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Print the tool schema catalogue as JSON")]
    Tools,
    #[command(about = "Invoke one tool and print its response envelope")]
    Invoke {
        #[arg(help = "Tool identifier, optionally gateway-prefixed (target___tool)")]
        tool: String,
        #[arg(short = 'p', long = "param", value_name = "KEY=VALUE", help = "Tool parameter; repeatable")]
        params: Vec<String>,
    },
    #[command(about = "Validate config, engine access, and the tool catalogue")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Tools => commands::tools::run(),
        Command::Invoke { tool, params } => commands::invoke::run(&tool, &params),
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
