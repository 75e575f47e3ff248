//! Command-line interface

pub mod serve;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "partner-gateway", about = "Partner API gateway")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the API server
    Serve,
}
