// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration file loading.
//!
//! The CLI and embedding hosts load [`EndpointConfig`] records from JSON or
//! YAML files; the format is chosen by extension, with JSON as the fallback
//! for unknown extensions.

use std::fs;
use std::path::Path;

use nodelink_core::error::{ConfigError, FlowResult};

use crate::schema::EndpointConfig;

/// Loads and validates an endpoint configuration from a file.
///
/// `.yaml`/`.yml` files are parsed as YAML, everything else as JSON.
pub fn load_endpoint_config(path: impl AsRef<Path>) -> FlowResult<EndpointConfig> {
    let path = path.as_ref();
    let display_path = path.display().to_string();

    let raw = fs::read_to_string(path).map_err(|e| ConfigError::io(&display_path, e))?;

    let config: EndpointConfig = match path.extension().and_then(|e| e.to_str()) {
        Some("yaml") | Some("yml") => {
            serde_yaml::from_str(&raw).map_err(|e| ConfigError::parse(&display_path, e))?
        }
        _ => serde_json::from_str(&raw).map_err(|e| ConfigError::parse(&display_path, e))?,
    };

    config.validate()?;

    tracing::debug!(path = %display_path, endpoint = %config.endpoint, "Loaded endpoint config");

    Ok(config)
}

// =============================================================================
// Tests
// =============================================================================
