use std::io::Write;

use proptest::prelude::*;
use sojourn_core::{CacheTtlConfig, ClientConfig, ConfigError, ReconnectConfig};

fn base_config() -> ClientConfig {
    ClientConfig {
        api_base_url: "https://api.sojourn.test".to_string(),
        chat_endpoint: "wss://hub.sojourn.test/chat".to_string(),
        notification_endpoint: "wss://hub.sojourn.test/notifications".to_string(),
        storage_path: "tmp/sojourn-client.json".into(),
        request_timeout_ms: 5_000,
        reconnect: ReconnectConfig::default(),
        cache: CacheTtlConfig::default(),
    }
}

#[test]
fn base_config_is_valid() {
    assert!(base_config().validate().is_ok());
}

#[test]
fn config_requires_endpoints() {
    let mut config = base_config();
    config.chat_endpoint = "  ".to_string();
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidValue {
            field: "chat_endpoint",
            ..
        })
    ));

    let mut config = base_config();
    config.notification_endpoint = String::new();
    assert!(config.validate().is_err());
}

#[test]
fn config_requires_a_timeout() {
    let mut config = base_config();
    config.request_timeout_ms = 0;
    assert!(config.validate().is_err());
}

#[test]
fn default_reconnect_matches_the_canonical_schedule() {
    let reconnect = ReconnectConfig::default();
    assert_eq!(reconnect.initial_ms, 1_000);
    assert_eq!(reconnect.max_ms, 30_000);
    assert_eq!(reconnect.multiplier, 2.0);
    assert_eq!(reconnect.jitter_ms, 0);
}

#[test]
fn config_loads_from_toml() {
    let mut file = tempfile::NamedTempFile::new().expect("tempfile");
    write!(
        file,
        r#"
api_base_url = "https://api.sojourn.test"
chat_endpoint = "wss://hub.sojourn.test/chat"
notification_endpoint = "wss://hub.sojourn.test/notifications"
storage_path = "tmp/sojourn-client.json"
request_timeout_ms = 5000

[reconnect]
initial_ms = 500
max_ms = 10000
multiplier = 1.5
jitter_ms = 100
max_attempts = 5
"#
    )
    .expect("write config");

    let config = ClientConfig::from_path(file.path()).expect("parse config");
    assert_eq!(config.reconnect.initial_ms, 500);
    assert_eq!(config.reconnect.max_attempts, 5);
    // Omitted sections fall back to defaults.
    assert_eq!(config.cache.cart_ttl_ms, 60_000);
    assert!(config.validate().is_ok());
}

#[test]
fn unknown_fields_are_rejected() {
    let mut file = tempfile::NamedTempFile::new().expect("tempfile");
    write!(
        file,
        r#"
api_base_url = "https://api.sojourn.test"
chat_endpoint = "wss://hub.sojourn.test/chat"
notification_endpoint = "wss://hub.sojourn.test/notifications"
storage_path = "tmp/sojourn-client.json"
request_timeout_ms = 5000
legacy_field = true
"#
    )
    .expect("write config");

    assert!(matches!(
        ClientConfig::from_path(file.path()),
        Err(ConfigError::Parse { .. })
    ));
}

proptest! {
    #[test]
    fn reconnect_config_validation(
        initial in 1u64..1_000,
        max_delta in 0u64..2_000,
        multiplier in 1.0f64..4.0,
        max_attempts in 1u32..32,
    ) {
        let mut config = base_config();
        config.reconnect = ReconnectConfig {
            initial_ms: initial,
            max_ms: initial + max_delta,
            multiplier,
            jitter_ms: 50,
            max_attempts,
        };
        prop_assert!(config.validate().is_ok());
    }

    #[test]
    fn invalid_reconnect_config_rejected(multiplier in 0.0f64..1.0) {
        let mut config = base_config();
        config.reconnect = ReconnectConfig {
            initial_ms: 0,
            max_ms: 0,
            multiplier,
            jitter_ms: 0,
            max_attempts: 0,
        };
        prop_assert!(config.validate().is_err());
    }
}
