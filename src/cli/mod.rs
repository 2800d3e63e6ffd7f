//! CLI module for Credential Guard
//!
//! - `serve`: run the HTTP surface with the background sweeper

pub mod serve;

use clap::{Parser, Subcommand};

/// Credential Guard - credential security and abuse prevention
#[derive(Parser)]
#[command(name = "credential-guard")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the HTTP server
    Serve(serve::ServeArgs),
}
