mod resolve;

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

use resolve::ResolveArgs;

#[derive(Parser, Debug)]
#[command(name = "depscout")]
#[command(about = "Vulnerability-aware dependency resolution for npm packages")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Resolve root requirements to a concrete version assignment
    Resolve(ResolveArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();

    let args = Args::parse();
    let result: Result<i32> = match args.command {
        Commands::Resolve(resolve_args) => resolve::execute(resolve_args).await,
    };

    match result {
        Ok(code) => ExitCode::from(code as u8),
        Err(err) => {
            eprintln!("{} {:#}", console::style("error:").red().bold(), err);
            ExitCode::FAILURE
        }
    }
}
