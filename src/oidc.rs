//! OIDC configuration carried by apply-auth tasks.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

pub const ISSUER_KEY: &str = "issuer";
pub const JWKS_URI_KEY: &str = "jwks_uri";
pub const AUDIENCES_KEY: &str = "audiences";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum OidcConfigError {
    #[error("auth properties are missing")]
    MissingProperties,
    #[error("issuer is missing from auth properties")]
    MissingIssuer,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OidcConfig {
    pub issuer: String,
    pub jwks_uri: String,
    pub audiences: Vec<String>,
    /// Every property that is not one of the recognized keys
    pub additional_properties: HashMap<String, String>,
}

impl OidcConfig {
    /// Split a property map into the recognized OIDC fields and the rest.
    pub fn extract(properties: Option<&HashMap<String, String>>) -> Result<Self, OidcConfigError> {
        let properties = properties.ok_or(OidcConfigError::MissingProperties)?;

        let mut config = OidcConfig {
            additional_properties: HashMap::with_capacity(properties.len()),
            ..Self::default()
        };
        let mut audiences = "";

        for (key, value) in properties {
            match key.as_str() {
                ISSUER_KEY => config.issuer = value.clone(),
                JWKS_URI_KEY => config.jwks_uri = value.clone(),
                AUDIENCES_KEY => audiences = value.as_str(),
                _ => {
                    config
                        .additional_properties
                        .insert(key.clone(), value.clone());
                }
            }
        }

        if config.issuer.is_empty() {
            return Err(OidcConfigError::MissingIssuer);
        }

        config.audiences = parse_comma_separated(audiences);
        Ok(config)
    }
}

/// Trimmed, non-empty elements of a comma-separated list
pub fn parse_comma_separated(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(String::from)
        .collect()
}
