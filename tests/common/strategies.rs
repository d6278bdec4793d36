use proptest::prelude::*;
use std::collections::HashMap;

/// Keys the OIDC extractor recognizes
pub const RECOGNIZED_KEYS: [&str; 3] = ["issuer", "jwks_uri", "audiences"];

/// Strategy for generating tenant identifiers, including non-ASCII ones
pub fn tenant_id_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z0-9-]{1,40}",
        "[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}",
        "\\PC{1,12}",
    ]
}

/// Strategy for generating non-empty issuer URLs
pub fn issuer_strategy() -> impl Strategy<Value = String> {
    "https://[a-z]{1,12}\\.example(/[a-z]{1,8})?"
}

/// Strategy for generating extra auth properties that never collide with
/// recognized keys
pub fn extra_properties_strategy() -> impl Strategy<Value = HashMap<String, String>> {
    prop::collection::hash_map("x_[a-z_]{1,12}", "[ -~]{0,24}", 0..6)
}

/// Strategy for generating messy comma-separated audience lists
pub fn audiences_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop_oneof!["[a-z]{1,8}", Just(String::new()), Just("  ".to_string())],
        0..8,
    )
    .prop_map(|parts| parts.join(","))
}
