use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;
mod output;
mod script;

use cli::{Cli, Commands};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr so stdout stays parseable
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("fieldtext=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match &cli.command {
        Commands::Replay(args) => commands::replay::run(args, cli.format),
    }
}
