//! # Tenant Schema Names
//!
//! Deterministic, reversible mapping from a caller-assigned tenant identifier
//! to the name of its isolated database schema.
//!
//! The identifier bytes are encoded in base62 (`0-9A-Za-z`) and prefixed with
//! `_`. PostgreSQL limits identifiers to 63 bytes, so the encoded part must be
//! between 3 and 62 characters; identifiers outside that window are rejected
//! rather than truncated. The probe, schema creation and offboarding all derive
//! the name through [`encode`], so they always agree.

use thiserror::Error;

pub const SCHEMA_NAME_PREFIX: &str = "_";

pub const MIN_ENCODED_LENGTH: usize = 3;
pub const MAX_ENCODED_LENGTH: usize = 62;

const ALPHABET: &[u8; 62] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaNameError {
    #[error("tenant ID is empty")]
    EmptyTenantId,
    #[error("encoded schema name length must be between {MIN_ENCODED_LENGTH} and {MAX_ENCODED_LENGTH}, got {0}")]
    InvalidLength(usize),
    #[error("schema name must start with '{SCHEMA_NAME_PREFIX}'")]
    MissingPrefix,
    #[error("invalid character '{0}' in schema name")]
    InvalidCharacter(char),
    #[error("decoded schema name is not valid UTF-8")]
    InvalidUtf8,
}

/// Derive the schema name for a tenant identifier
pub fn encode(tenant_id: &str) -> Result<String, SchemaNameError> {
    if tenant_id.is_empty() {
        return Err(SchemaNameError::EmptyTenantId);
    }

    let encoded = encode_base62(tenant_id.as_bytes());
    check_length(encoded.len())?;

    Ok(format!("{SCHEMA_NAME_PREFIX}{encoded}"))
}

/// Recover the tenant identifier from a schema name produced by [`encode`]
pub fn decode(schema_name: &str) -> Result<String, SchemaNameError> {
    validate(schema_name)?;

    let encoded = &schema_name[SCHEMA_NAME_PREFIX.len()..];
    let bytes = decode_base62(encoded)?;

    String::from_utf8(bytes).map_err(|_| SchemaNameError::InvalidUtf8)
}

/// Check prefix, alphabet and length without decoding.
///
/// Stores call this before interpolating a schema name into DDL.
pub fn validate(schema_name: &str) -> Result<(), SchemaNameError> {
    let encoded = schema_name
        .strip_prefix(SCHEMA_NAME_PREFIX)
        .ok_or(SchemaNameError::MissingPrefix)?;

    check_length(encoded.len())?;

    match encoded.chars().find(|c| !c.is_ascii_alphanumeric()) {
        Some(c) => Err(SchemaNameError::InvalidCharacter(c)),
        None => Ok(()),
    }
}

fn check_length(len: usize) -> Result<(), SchemaNameError> {
    if (MIN_ENCODED_LENGTH..=MAX_ENCODED_LENGTH).contains(&len) {
        Ok(())
    } else {
        Err(SchemaNameError::InvalidLength(len))
    }
}

fn encode_base62(input: &[u8]) -> String {
    let leading_zeros = input.iter().take_while(|b| **b == 0).count();

    // Little-endian base62 digits of the big-endian input number
    let mut digits: Vec<u8> = Vec::with_capacity(input.len() * 138 / 100 + 1);
    for byte in input {
        let mut carry = u32::from(*byte);
        for digit in digits.iter_mut() {
            carry += u32::from(*digit) << 8;
            *digit = (carry % 62) as u8;
            carry /= 62;
        }
        while carry > 0 {
            digits.push((carry % 62) as u8);
            carry /= 62;
        }
    }

    let mut out = String::with_capacity(leading_zeros + digits.len());
    out.extend(std::iter::repeat('0').take(leading_zeros));
    out.extend(digits.iter().rev().map(|d| ALPHABET[*d as usize] as char));
    out
}

fn decode_base62(input: &str) -> Result<Vec<u8>, SchemaNameError> {
    let leading_zeros = input.chars().take_while(|c| *c == '0').count();

    let mut bytes: Vec<u8> = Vec::with_capacity(input.len());
    for c in input.chars() {
        let mut carry = digit_value(c)?;
        for byte in bytes.iter_mut() {
            carry += u32::from(*byte) * 62;
            *byte = (carry & 0xff) as u8;
            carry >>= 8;
        }
        while carry > 0 {
            bytes.push((carry & 0xff) as u8);
            carry >>= 8;
        }
    }

    let mut out = vec![0u8; leading_zeros];
    out.extend(bytes.iter().rev());
    Ok(out)
}

fn digit_value(c: char) -> Result<u32, SchemaNameError> {
    match c {
        '0'..='9' => Ok(c as u32 - '0' as u32),
        'A'..='Z' => Ok(c as u32 - 'A' as u32 + 10),
        'a'..='z' => Ok(c as u32 - 'a' as u32 + 36),
        _ => Err(SchemaNameError::InvalidCharacter(c)),
    }
}
