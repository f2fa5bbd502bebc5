//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use chrono::{NaiveDate, NaiveTime};
use clap::{Args, Subcommand, ValueEnum};

/// Order commands.
#[derive(Debug, Subcommand)]
pub enum OrderCommand {
    /// Place a new order (starts Pending)
    Create {
        /// What is being ordered
        #[arg(short, long)]
        title: String,

        /// Price in whole currency units
        #[arg(short, long)]
        amount: u64,
    },

    /// List orders
    List(ListArgs),

    /// Set an order's status
    Set(SetStatusArgs),

    /// Pay for a pending order with the simulated gateway
    Checkout {
        /// Order id
        id: String,

        /// RNG seed for a reproducible outcome
        #[arg(long)]
        seed: Option<u64>,

        /// Wait out the processing delays in real time
        #[arg(long)]
        realtime: bool,
    },
}

/// Booking commands.
#[derive(Debug, Subcommand)]
pub enum BookingCommand {
    /// Request a pal visit (starts pending approval)
    Create {
        /// Pal to book
        #[arg(short, long)]
        pal: String,

        /// Agreed price in whole currency units
        #[arg(long)]
        price: u64,

        /// Visit date (YYYY-MM-DD)
        #[arg(short, long)]
        date: NaiveDate,

        /// Start time (HH:MM)
        #[arg(short, long, value_parser = parse_start_time)]
        start: NaiveTime,

        /// Length of the visit in hours
        #[arg(long, default_value = "1", value_parser = clap::value_parser!(u8).range(1..=24))]
        hours: u8,

        /// Instructions for the pal
        #[arg(short, long)]
        notes: Option<String>,
    },

    /// List bookings
    List(ListArgs),

    /// Set a booking's status
    Set(SetStatusArgs),
}

/// Errand commands.
#[derive(Debug, Subcommand)]
pub enum ErrandCommand {
    /// Post a new errand (starts pending)
    Create {
        /// What needs doing
        #[arg(short, long)]
        title: String,

        /// Reward in whole currency units
        #[arg(short, long)]
        reward: u64,
    },

    /// List errands
    List(ListArgs),

    /// Set an errand's status
    Set(SetStatusArgs),

    /// Assign a pal and move the errand to in-progress
    Start {
        /// Errand id
        id: String,

        /// Pal taking the errand
        #[arg(short, long)]
        pal: String,
    },
}

/// Call commands.
#[derive(Debug, Subcommand)]
pub enum CallCommand {
    /// Run a scripted call and print each status change
    Simulate {
        /// Who to call
        #[arg(long, default_value = "Care Pal")]
        contact: String,

        /// Hang up this many milliseconds after dialing
        #[arg(long, value_name = "MS", conflicts_with = "reject_at_ms")]
        end_at_ms: Option<u64>,

        /// The callee declines this many milliseconds after dialing
        #[arg(long, value_name = "MS")]
        reject_at_ms: Option<u64>,

        /// Stop watching after this many milliseconds
        #[arg(long, value_name = "MS", default_value = "60000")]
        duration_ms: u64,

        /// Play the call out in real time
        #[arg(long)]
        realtime: bool,
    },
}

/// Arguments shared by every `list` command.
#[derive(Debug, Args)]
pub struct ListArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments shared by every `set` command.
#[derive(Debug, Args)]
pub struct SetStatusArgs {
    /// Record id
    pub id: String,

    /// New status (e.g. `paid`, `approved_and_assigned`, `in-progress`)
    pub status: String,
}

/// Reset command arguments.
#[derive(Debug, Args)]
pub struct ResetCommand {
    /// Skip confirmation
    #[arg(short, long)]
    pub yes: bool,
}

/// Status command arguments.
#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Output format for commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Plain text output
    #[default]
    Plain,
    /// Formatted table
    Table,
    /// JSON output
    Json,
}

fn parse_start_time(s: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .map_err(|_| format!("expected HH:MM, got '{s}'"))
}
