//! Lenient hex (de)serialization of call data.
//!
//! Wallet tooling commonly writes short call data such as `0x0`, which is not valid even-length
//! hex. Odd-length input is left-padded with a zero nibble, so `0x0` decodes to a single zero byte.

use alloy::{hex, primitives::Bytes};
use serde::{Deserialize, Deserializer, Serializer, de::Error};

/// Parses call data from a hex string, accepting odd-length input.
pub fn parse(input: &str) -> Result<Bytes, hex::FromHexError> {
    let digits = input.strip_prefix("0x").or_else(|| input.strip_prefix("0X")).unwrap_or(input);
    if digits.len() % 2 == 1 {
        hex::decode(format!("0{digits}")).map(Into::into)
    } else {
        hex::decode(digits).map(Into::into)
    }
}

/// Serializes call data as `0x`-prefixed hex.
pub fn serialize<S>(data: &Bytes, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&hex::encode_prefixed(data))
}

/// Deserializes call data, accepting odd-length hex.
pub fn deserialize<'de, D>(deserializer: D) -> Result<Bytes, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse(&s).map_err(D::Error::custom)
}
