// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Endpoint template resolution.
//!
//! Endpoint URLs in configuration may reference environment variables with
//! `${VAR}` placeholders (`opc.tcp://${PLC_HOST}:${PLC_PORT}`). Resolution
//! happens once, before the endpoint becomes a pool key; an unresolved
//! variable is a configuration error, not an empty substitution.

use std::env;

use nodelink_core::error::{ConfigError, FlowResult};
use nodelink_core::types::EndpointId;

/// Resolves `${VAR}` placeholders in a template using the given lookup.
///
/// Returns an error for the first placeholder the lookup cannot satisfy and
/// for unterminated `${` sequences.
pub fn resolve_template<F>(template: &str, lookup: F) -> FlowResult<String>
where
    F: Fn(&str) -> Option<String>,
{
    let mut resolved = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("${") {
        resolved.push_str(&rest[..start]);
        let after = &rest[start + 2..];

        let end = after.find('}').ok_or_else(|| {
            ConfigError::invalid_endpoint(template, "unterminated '${' in template")
        })?;

        let name = &after[..end];
        if name.is_empty() {
            return Err(
                ConfigError::invalid_endpoint(template, "empty variable name in template").into(),
            );
        }

        let value = lookup(name).ok_or_else(|| ConfigError::unresolved_variable(name))?;
        resolved.push_str(&value);

        rest = &after[end + 1..];
    }

    resolved.push_str(rest);
    Ok(resolved)
}

/// Resolves an endpoint template against the process environment and checks
/// the result is a usable endpoint URL.
pub fn resolve_endpoint(template: &str) -> FlowResult<EndpointId> {
    let resolved = resolve_template(template, |name| env::var(name).ok())?;

    let trimmed = resolved.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::MissingEndpoint.into());
    }
    if !trimmed.contains("://") {
        return Err(
            ConfigError::invalid_endpoint(trimmed, "missing URL scheme (expected opc.tcp://...)")
                .into(),
        );
    }

    let endpoint = EndpointId::new(trimmed);
    if !endpoint.is_opc_tcp() {
        tracing::warn!(
            endpoint = %endpoint,
            "Endpoint does not use the opc.tcp scheme"
        );
    }

    Ok(endpoint)
}

// =============================================================================
// Tests
// =============================================================================
