// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # nodelink-config
//!
//! Declarative endpoint configuration for the NODELINK OPC UA flow bridge.
//!
//! A configuration record names one OPC UA server: an endpoint URL template
//! (resolved against the process environment), the security profile, and a
//! tagged credentials union with exactly one active authentication mode.
//!
//! ## Example
//!
//! ```rust
//! use nodelink_config::schema::{CredentialsConfig, EndpointConfig};
//!
//! let config = EndpointConfig::anonymous("opc.tcp://localhost:4840");
//! config.validate().unwrap();
//! assert!(config.credentials.is_anonymous());
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod loader;
pub mod resolve;
pub mod schema;

pub use loader::load_endpoint_config;
pub use resolve::{resolve_endpoint, resolve_template};
pub use schema::{CredentialsConfig, EndpointConfig};
