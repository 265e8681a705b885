// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # nodelink-bin
//!
//! Command line interface for the NODELINK OPC UA flow bridge.
//!
//! Provides one-shot `read`/`write` actions (with the `real-transport`
//! feature), configuration validation, and version output.

#![warn(missing_docs)]
#![deny(unsafe_code)]

use std::process::ExitCode;

use clap::Parser;

pub mod cli;
pub mod commands;
pub mod error;
pub mod logging;

use cli::{Cli, Command};

/// Parses arguments, initializes logging, and runs the selected command.
pub fn run() -> ExitCode {
    let cli = Cli::parse();

    logging::init_logging(&cli.log_level, cli.log_format);

    let result = match cli.command {
        Command::Validate { config } => commands::validate::run(&config),
        Command::Read { config, node } => block_on(commands::action::read(&config, &node)),
        Command::Write {
            config,
            node,
            value,
            data_type,
        } => block_on(commands::action::write(&config, &node, &value, &data_type)),
        Command::Version => {
            commands::version::run();
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            eprintln!("Error: {e}");
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

/// Runs an async command on a fresh runtime.
fn block_on<F>(future: F) -> error::CliResult<()>
where
    F: std::future::Future<Output = error::CliResult<()>>,
{
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| error::CliError::operation_failed(format!("runtime start failed: {e}")))?
        .block_on(future)
}
