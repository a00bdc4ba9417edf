//! Error types for the `ordered-hash` crate.

/// Errors reported by the ordered containers and their stream formats.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The table reached the maximum number of entries (or buckets)
    /// representable by its position width.
    #[error("the table reached the maximum size supported by its position width ({max_size} entries)")]
    CapacityExceeded {
        /// Maximum number of entries the position width can address.
        max_size: usize,
    },

    /// A checked lookup did not find the requested key.
    #[error("key not found")]
    KeyNotFound,

    /// A maximum load factor outside the supported range was supplied or
    /// deserialized.
    #[error("max load factor {value} is outside the supported range [{min}, {max}]")]
    InvalidMaxLoadFactor {
        /// The rejected value.
        value: f32,
        /// Lower bound of the supported range.
        min: f32,
        /// Upper bound of the supported range.
        max: f32,
    },

    /// A serialized stream declared an unknown protocol version.
    #[error("unknown serialization protocol version {found} (expected {expected})")]
    ProtocolMismatch {
        /// Version found in the stream header.
        found: u32,
        /// Version this crate reads and writes.
        expected: u32,
    },

    /// A serialized stream declared counts or positions that are out of
    /// range, or its framing is inconsistent.
    #[error("malformed stream: {reason}")]
    MalformedStream {
        /// Human-readable description of the inconsistency.
        reason: &'static str,
    },

    /// An I/O error surfaced while reading or writing a stream.
    #[cfg(feature = "std")]
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn malformed(reason: &'static str) -> Self {
        Error::MalformedStream { reason }
    }
}
