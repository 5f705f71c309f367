pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "krishi",
    about = "Krishi operator CLI",
    long_about = "Inspect Krishi configuration, check readiness, and try the query interpreter \
                  and crop calendar offline.",
    after_help = "Examples:\n  krishi doctor --json\n  \
                  krishi interpret \"Bihar mein dhan ka bhav\"\n  \
                  krishi calendar rice --state Bihar --month 7"
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
    #[command(about = "Validate config, the crop calendar, LLM readiness, and an offline advisory")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Show how a farmer message is parsed into crop, region, and topics")]
    Interpret {
        text: String,
        #[arg(long, help = "Opaque image reference attached to the message")]
        image: Option<String>,
    },
    #[command(about = "Look up the planting and harvest window for a crop")]
    Calendar {
        crop: String,
        #[arg(long, help = "Month number 1-12; defaults to the current month in India")]
        month: Option<u32>,
        #[arg(long, help = "State name for regional windows and suitability")]
        state: Option<String>,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Config => commands::config::run(),
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Interpret { text, image } => commands::interpret::run(&text, image),
        Command::Calendar { crop, month, state } => {
            commands::calendar::run(&crop, month, state.as_deref())
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
