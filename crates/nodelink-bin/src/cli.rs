// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Command line argument definitions.

use clap::{Parser, Subcommand, ValueEnum};

// =============================================================================
// Cli
// =============================================================================

/// NODELINK: OPC UA client bridge for flow-based automation runtimes.
#[derive(Debug, Parser)]
#[command(name = "nodelink", version, about, long_about = None)]
pub struct Cli {
    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable text output.
    Text,
    /// JSON output for log aggregation.
    Json,
    /// Minimal compact output.
    Compact,
}

// =============================================================================
// Command
// =============================================================================

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Validate an endpoint configuration file.
    Validate {
        /// Path to the configuration file (JSON or YAML).
        config: String,
    },

    /// Read one node value from the configured server.
    Read {
        /// Path to the configuration file (JSON or YAML).
        #[arg(long)]
        config: String,

        /// Node identifier, e.g. "ns=2;s=Temperature".
        node: String,
    },

    /// Write one typed value to a node on the configured server.
    Write {
        /// Path to the configuration file (JSON or YAML).
        #[arg(long)]
        config: String,

        /// Node identifier, e.g. "ns=2;s=Setpoint".
        node: String,

        /// Value to write, parsed as JSON (falls back to a plain string).
        value: String,

        /// Data type tag, e.g. "Double".
        #[arg(long)]
        data_type: String,
    },

    /// Print version information.
    Version,
}

// =============================================================================
// Tests
// =============================================================================
