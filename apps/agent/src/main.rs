#![warn(clippy::all)]

use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;

use cli::{Cli, Commands};
use pipe_agent::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    logger::init_with_level(cli.log_level());

    let config = Config::from_config(cli.config.as_deref())?;

    match cli.cmd {
        Commands::Run => commands::run(&config).await,
        Commands::Login(args) => commands::login(&config, args).await,
        Commands::Signup(args) => commands::signup(&config, args).await,
        Commands::Config => {
            print!("{config}");
            Ok(())
        }
    }
}
