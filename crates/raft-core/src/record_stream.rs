//! # record_stream
//!
//! why: frame arbitrary binary payloads so a log file can be scanned forward on recovery
//! relations: used by raft-storage's LogStore for both append and open
//! what: RecordStream reader, Decoded result, encode_one / encode_all / decode_all
//!
//! Wire layout: `[u32 little-endian payload length][payload]`, repeated back to
//! back with no header, separator or trailer.

use crate::codec::Record;
use crate::error::{Error, Result};

/// Size of the little-endian length prefix in front of every payload
pub const LENGTH_PREFIX: usize = 4;

/// Forward-only reader over a buffer of framed records.
///
/// The first decode failure poisons the stream: every later read returns
/// [`Error::StreamInvalid`] without touching the buffer again.
#[derive(Debug)]
pub struct RecordStream<'a> {
    buf: &'a [u8],
    offset: usize,
    decoded: usize,
    valid: bool,
}

impl<'a> RecordStream<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            offset: 0,
            decoded: 0,
            valid: true,
        }
    }

    /// Byte offset at which the next record starts
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Number of records decoded so far
    pub fn decoded(&self) -> usize {
        self.decoded
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Read the next record. `Ok(None)` means the buffer ended exactly on a
    /// record boundary.
    pub fn next_record<T: Record>(&mut self) -> Result<Option<T>> {
        if !self.valid {
            return Err(Error::StreamInvalid);
        }
        let remaining = &self.buf[self.offset..];
        if remaining.is_empty() {
            return Ok(None);
        }
        if remaining.len() < LENGTH_PREFIX {
            return Err(self.poison(format!(
                "truncated length prefix: {} of {} bytes",
                remaining.len(),
                LENGTH_PREFIX
            )));
        }

        let mut prefix = [0u8; LENGTH_PREFIX];
        prefix.copy_from_slice(&remaining[..LENGTH_PREFIX]);
        let size = u32::from_le_bytes(prefix) as usize;
        let body = &remaining[LENGTH_PREFIX..];
        if body.len() < size {
            return Err(self.poison(format!(
                "truncated payload: {} of {} bytes",
                body.len(),
                size
            )));
        }

        let record = match T::decode_payload(&body[..size]) {
            Ok(record) => record,
            Err(e) => return Err(self.poison(e.to_string())),
        };
        self.offset += LENGTH_PREFIX + size;
        self.decoded += 1;
        Ok(Some(record))
    }

    fn poison(&mut self, reason: String) -> Error {
        self.valid = false;
        Error::CorruptRecord {
            offset: self.offset,
            good_records: self.decoded,
            reason,
        }
    }
}

/// Outcome of scanning a whole buffer: every record read before the scan
/// stopped, and the error that stopped it if the buffer did not end cleanly.
#[derive(Debug)]
pub struct Decoded<T> {
    pub records: Vec<T>,
    pub error: Option<Error>,
}

impl<T> Decoded<T> {
    pub fn is_clean(&self) -> bool {
        self.error.is_none()
    }

    /// Treat any trailing corruption as fatal and drop the decoded prefix.
    pub fn into_result(self) -> Result<Vec<T>> {
        match self.error {
            None => Ok(self.records),
            Some(e) => Err(e),
        }
    }
}

/// Decode every record in `buf`, stopping at the first corrupt one.
pub fn decode_all<T: Record>(buf: &[u8]) -> Decoded<T> {
    let mut stream = RecordStream::new(buf);
    let mut records = Vec::new();
    loop {
        match stream.next_record() {
            Ok(Some(record)) => records.push(record),
            Ok(None) => return Decoded { records, error: None },
            Err(e) => {
                return Decoded {
                    records,
                    error: Some(e),
                }
            }
        }
    }
}

/// Encode one record with its length prefix.
pub fn encode_one<T: Record>(record: &T) -> Result<Vec<u8>> {
    let payload = record.encode_payload()?;
    let size = u32::try_from(payload.len()).map_err(|_| Error::Encode {
        what: T::KIND,
        reason: format!("payload of {} bytes does not fit a u32 length prefix", payload.len()),
    })?;
    let mut framed = Vec::with_capacity(LENGTH_PREFIX + payload.len());
    framed.extend_from_slice(&size.to_le_bytes());
    framed.extend_from_slice(&payload);
    Ok(framed)
}

/// Encode a sequence of records into one contiguous buffer.
pub fn encode_all<T: Record>(records: &[T]) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    for (i, record) in records.iter().enumerate() {
        let framed = encode_one(record).map_err(|e| match e {
            Error::Encode { what, reason } => Error::Encode {
                what,
                reason: format!("record {i}: {reason}"),
            },
            other => other,
        })?;
        buf.extend_from_slice(&framed);
    }
    Ok(buf)
}
