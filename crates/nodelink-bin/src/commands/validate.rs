// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! `nodelink validate`: load, validate, and resolve a configuration file.

use nodelink_config::{load_endpoint_config, resolve_endpoint};

use crate::error::CliResult;

/// Validates a configuration file and prints the resolved endpoint.
pub fn run(path: &str) -> CliResult<()> {
    let config = load_endpoint_config(path)?;
    let endpoint = resolve_endpoint(&config.endpoint)?;

    println!("Configuration OK");
    println!("  endpoint:        {}", endpoint);
    println!("  security policy: {}", config.security_policy);
    println!("  security mode:   {}", config.security_mode);
    println!("  credentials:     {}", config.credentials.mode());

    Ok(())
}
