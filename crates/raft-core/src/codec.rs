//! # codec
//!
//! why: one seam between the on-disk framing and the payload encoding of each record
//! relations: implemented by log.rs and term.rs, consumed by record_stream.rs and raft-storage
//! what: Record trait, serde_json backed helpers

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Error, Result};

/// A value that can be turned into an opaque payload and back.
///
/// The framing layers never look inside the payload; they only react to
/// `encode_payload` / `decode_payload` succeeding or failing.
pub trait Record: Sized {
    /// short human-readable name used in error messages
    const KIND: &'static str;

    fn encode_payload(&self) -> Result<Vec<u8>>;

    fn decode_payload(bytes: &[u8]) -> Result<Self>;
}

pub(crate) fn to_json<T: Serialize>(kind: &'static str, value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| Error::Encode {
        what: kind,
        reason: e.to_string(),
    })
}

pub(crate) fn from_json<T: DeserializeOwned>(kind: &'static str, bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|e| Error::Decode {
        what: kind,
        reason: e.to_string(),
    })
}
