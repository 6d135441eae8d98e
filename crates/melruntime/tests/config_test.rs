// crates/melruntime/tests/config_test.rs

use melruntime::{PlatformConfig, RuntimeConfig};
use std::collections::HashMap;
use std::time::Duration;

fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |name| vars.get(name).cloned()
}

#[test]
fn test_defaults_without_environment() {
    let config = PlatformConfig::from_lookup(lookup(&[]));
    let defaults = PlatformConfig::default();

    assert_eq!(config.trigger_base_url, defaults.trigger_base_url);
    assert_eq!(config.default_call_timeout, Duration::from_secs(30));
    assert!(config.trigger_timeout < config.default_call_timeout);
    assert_eq!(RuntimeConfig::default().max_parallel_nodes, 10);
}

#[test]
fn test_environment_overrides_defaults() {
    let config = PlatformConfig::from_lookup(lookup(&[
        ("MEL_TRIGGER_URL", "http://dispatch:9000/"),
        ("MEL_TRIGGER_TIMEOUT_SECS", "3"),
        ("MEL_CALL_TIMEOUT_SECS", "120"),
        ("MEL_HTTP_TIMEOUT_SECS", " 15 "),
        ("MEL_STORE_TTL_SECS", "600"),
    ]));

    assert_eq!(config.trigger_base_url, "http://dispatch:9000");
    assert_eq!(config.trigger_timeout, Duration::from_secs(3));
    assert_eq!(config.default_call_timeout, Duration::from_secs(120));
    assert_eq!(config.http_timeout, Duration::from_secs(15));
    assert_eq!(config.store_ttl, Duration::from_secs(600));
}

#[test]
fn test_invalid_durations_keep_defaults() {
    let config = PlatformConfig::from_lookup(lookup(&[
        ("MEL_CALL_TIMEOUT_SECS", "soon"),
        ("MEL_HTTP_TIMEOUT_SECS", "0"),
    ]));

    assert_eq!(config.default_call_timeout, Duration::from_secs(30));
    assert_eq!(config.http_timeout, Duration::from_secs(30));
}
