//! Serde helpers for configuration and wire types.

pub mod call_data;
pub mod duration;
