// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration schema, resolution, and credential-resolver tests.

use std::io::Write;

use serde_json::json;

use nodelink_config::schema::{CredentialsConfig, EndpointConfig};
use nodelink_config::{load_endpoint_config, resolve_template};
use nodelink_core::types::{SecurityMode, SecurityPolicy};
use nodelink_opcua::types::{ResolvedTarget, UserIdentity};
use nodelink_opcua::InboundMessage;

// =============================================================================
// Schema
// =============================================================================

#[test]
fn test_all_three_credential_modes_parse() {
    let anonymous: EndpointConfig = serde_json::from_value(json!({
        "endpoint": "opc.tcp://host:4840",
        "credentials": { "mode": "anonymous" }
    }))
    .unwrap();
    assert!(anonymous.credentials.is_anonymous());

    let username: EndpointConfig = serde_json::from_value(json!({
        "endpoint": "opc.tcp://host:4840",
        "credentials": { "mode": "username", "username": "op", "password": "pw" }
    }))
    .unwrap();
    assert_eq!(username.credentials.mode(), "username");

    let certificate: EndpointConfig = serde_json::from_value(json!({
        "endpoint": "opc.tcp://host:4840",
        "credentials": {
            "mode": "certificate",
            "certificate": "CERT",
            "privateKey": "KEY"
        }
    }))
    .unwrap();
    assert_eq!(certificate.credentials.mode(), "certificate");
}

#[test]
fn test_security_profile_parses() {
    let config: EndpointConfig = serde_json::from_value(json!({
        "endpoint": "opc.tcp://host:4840",
        "securityPolicy": "Basic256Sha256",
        "securityMode": "SignAndEncrypt"
    }))
    .unwrap();

    assert_eq!(config.security_policy, SecurityPolicy::Basic256Sha256);
    assert_eq!(config.security_mode, SecurityMode::SignAndEncrypt);
}

#[test]
fn test_unknown_mode_is_rejected() {
    let parsed: Result<CredentialsConfig, _> =
        serde_json::from_value(json!({ "mode": "token" }));
    assert!(parsed.is_err());
}

// =============================================================================
// Template resolution
// =============================================================================

#[test]
fn test_template_resolution_against_map() {
    let lookup = |name: &str| match name {
        "HOST" => Some("plant-a".to_string()),
        "PORT" => Some("4840".to_string()),
        _ => None,
    };

    assert_eq!(
        resolve_template("opc.tcp://${HOST}:${PORT}", lookup).unwrap(),
        "opc.tcp://plant-a:4840"
    );

    let err = resolve_template("opc.tcp://${MISSING}", lookup).unwrap_err();
    assert!(err.to_string().contains("MISSING"));
}

#[test]
fn test_resolved_target_uses_environment() {
    std::env::set_var("NODELINK_IT_HOST", "env-plc");

    let config = EndpointConfig::anonymous("opc.tcp://${NODELINK_IT_HOST}:4840");
    let target = ResolvedTarget::resolve(&config).unwrap();

    assert_eq!(target.options.endpoint.as_str(), "opc.tcp://env-plc:4840");

    std::env::remove_var("NODELINK_IT_HOST");
}

#[test]
fn test_resolution_fails_without_endpoint() {
    let config = EndpointConfig::anonymous("");
    assert!(ResolvedTarget::resolve(&config).is_err());
}

// =============================================================================
// Credential resolver
// =============================================================================

#[test]
fn test_identity_matches_mode() {
    let target = ResolvedTarget::resolve(&EndpointConfig::anonymous("opc.tcp://h:4840")).unwrap();
    assert!(matches!(target.identity, UserIdentity::Anonymous));

    let config = EndpointConfig::anonymous("opc.tcp://h:4840").with_credentials(
        CredentialsConfig::Username {
            username: "op".to_string(),
            password: "pw".to_string(),
        },
    );
    let target = ResolvedTarget::resolve(&config).unwrap();
    match target.identity {
        UserIdentity::UserName { username, password } => {
            assert_eq!(username, "op");
            assert_eq!(password, "pw");
        }
        other => panic!("unexpected identity {:?}", other),
    }

    let config = EndpointConfig::anonymous("opc.tcp://h:4840").with_credentials(
        CredentialsConfig::Certificate {
            certificate: "CERT".to_string(),
            private_key: "KEY".to_string(),
        },
    );
    let target = ResolvedTarget::resolve(&config).unwrap();
    match target.identity {
        UserIdentity::Certificate {
            certificate,
            private_key,
        } => {
            assert_eq!(certificate, b"CERT");
            assert_eq!(private_key, "KEY");
        }
        other => panic!("unexpected identity {:?}", other),
    }
}

#[test]
fn test_incomplete_credentials_fail_resolution() {
    let config = EndpointConfig::anonymous("opc.tcp://h:4840").with_credentials(
        CredentialsConfig::Username {
            username: String::new(),
            password: "pw".to_string(),
        },
    );
    assert!(ResolvedTarget::resolve(&config).is_err());
}

// =============================================================================
// File loading
// =============================================================================

#[test]
fn test_yaml_and_json_round_trip() {
    let mut json_file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    json_file
        .write_all(
            br#"{ "endpoint": "opc.tcp://host:4840",
                  "credentials": { "mode": "username", "username": "op", "password": "pw" } }"#,
        )
        .unwrap();
    let from_json = load_endpoint_config(json_file.path()).unwrap();

    let mut yaml_file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    yaml_file
        .write_all(
            b"endpoint: opc.tcp://host:4840\ncredentials:\n  mode: username\n  username: op\n  password: pw\n",
        )
        .unwrap();
    let from_yaml = load_endpoint_config(yaml_file.path()).unwrap();

    assert_eq!(from_json, from_yaml);
}

// =============================================================================
// Inbound message shape
// =============================================================================

#[test]
fn test_full_inbound_message_round_trip() {
    let msg: InboundMessage = serde_json::from_value(json!({
        "config": {
            "endpoint": "opc.tcp://inline:4840",
            "securityPolicy": "None",
            "securityMode": "None",
            "credentials": { "mode": "anonymous" }
        },
        "action": "read-multiple",
        "payload": [
            {"nodeId": "ns=2;s=A"},
            {"nodeId": "ns=2;s=B", "dataType": "Double"}
        ]
    }))
    .unwrap();

    assert!(msg.config.is_some());
    assert_eq!(
        msg.action,
        Some(nodelink_core::types::ActionKind::ReadMultiple)
    );
    assert!(msg.payload.unwrap().is_array());
}
