use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};
use tracing::level_filters::LevelFilter;

#[derive(Parser)]
#[command(author, version, about = "Multi-account pipe network heartbeat and node-probe agent")]
pub struct Cli {
    /// Config file (defaults to $XDG_CONFIG_HOME/pipe-agent/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub cmd: Commands,
}

impl Cli {
    pub fn log_level(&self) -> LevelFilter {
        match self.verbose {
            0 => LevelFilter::INFO,
            1 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Send heartbeats and run node test cycles for every account in the tokens file
    Run,

    /// Log in and print the session token
    Login(LoginArgs),

    /// Register a new account and print the session token
    Signup(SignupArgs),

    /// Print the effective configuration
    Config,
}

#[derive(Args)]
pub struct LoginArgs {
    #[arg(short, long, required_unless_present = "all", requires = "password")]
    pub email: Option<String>,

    #[arg(short, long)]
    pub password: Option<String>,

    /// Log in every `email:password` pair from the credentials file
    #[arg(long, conflicts_with_all = ["email", "password"])]
    pub all: bool,

    /// Append `token,email` to the tokens file on success
    #[arg(long)]
    pub save: bool,
}

#[derive(Args)]
pub struct SignupArgs {
    #[arg(short, long)]
    pub email: String,

    #[arg(short, long)]
    pub password: String,

    #[arg(short, long)]
    pub referral_code: Option<String>,

    /// Append `token,email` to the tokens file on success
    #[arg(long)]
    pub save: bool,
}
