//! Command-line interface for carepal.
//!
//! This module provides the CLI structure for the `carepal` binary; the
//! handlers live in the binary itself.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::logging::Verbosity;

pub use commands::{
    BookingCommand, CallCommand, ConfigCommand, ErrandCommand, ListArgs, OrderCommand,
    OutputFormat, ResetCommand, SetStatusArgs, StatusCommand,
};

/// carepal - Care coordination lifecycle tracker
///
/// Tracks orders, pal bookings and errands through their status lifecycles,
/// and simulates calls and payments.
#[derive(Debug, Parser)]
#[command(name = "carepal")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create, list and update service orders
    #[command(subcommand)]
    Order(OrderCommand),

    /// Create, list and update pal bookings
    #[command(subcommand)]
    Booking(BookingCommand),

    /// Create, list and update errands
    #[command(subcommand)]
    Errand(ErrandCommand),

    /// Simulate calls
    #[command(subcommand)]
    Call(CallCommand),

    /// Clear every store
    Reset(ResetCommand),

    /// Show storage status
    Status(StatusCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Command {
    /// Whether running this command can change a store.
    #[must_use]
    pub fn mutates_state(&self) -> bool {
        match self {
            Self::Order(cmd) => !matches!(cmd, OrderCommand::List(_)),
            Self::Booking(cmd) => !matches!(cmd, BookingCommand::List(_)),
            Self::Errand(cmd) => !matches!(cmd, ErrandCommand::List(_)),
            Self::Reset(cmd) => cmd.yes,
            Self::Call(_) | Self::Status(_) | Self::Config(_) => false,
        }
    }
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.quiet, self.verbose)
    }
}
