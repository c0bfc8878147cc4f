// MIT License - Copyright (c) 2026 Peter Wright

/// All errors that can occur when talking to an AMT-8000 central.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The central rejected the configured password (auth result 1).
    #[error("invalid password")]
    InvalidPassword,

    /// The central refused authentication with a result code other than
    /// 0 (ok) or 1 (bad password).
    #[error("authentication failed: code {0}")]
    AuthFailed(u8),

    /// Arm was rejected because zones are open.
    #[error("cannot arm: open zones")]
    OpenZones,

    #[error("could not connect to {addr}: {source}")]
    DialFailed {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("connection lost: {0}")]
    ConnectionLost(#[source] std::io::Error),

    /// A bounded read finished (or timed out) before delivering every
    /// requested byte.
    #[error("short read: wanted {wanted} bytes, read {read}")]
    ShortRead { wanted: usize, read: usize },

    /// Malformed frame, checksum mismatch, or an unexpected reply opcode.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Status reply body was not the expected 143 bytes.
    #[error("invalid status reply: {0} bytes")]
    InvalidStatus(usize),

    #[error("invalid zone {0}: must be between 1 and 64")]
    InvalidZone(u8),

    #[error("invalid partition {0}: must be between 0 and 16")]
    InvalidPartition(u8),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the command executor should retry after this error.
    ///
    /// Auth rejections, open zones, and argument validation failures are
    /// permanent; everything else is assumed to be a fault of the single
    /// fragile TCP session and is retried on a fresh one.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::DialFailed { .. }
                | Error::ConnectionLost(_)
                | Error::ShortRead { .. }
                | Error::Protocol(_)
                | Error::InvalidStatus(_)
                | Error::Io(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
