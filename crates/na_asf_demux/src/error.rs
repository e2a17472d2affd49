use thiserror::Error;

use crate::guid::Guid;

#[derive(Debug, Error)]
pub enum DemuxError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Unsupported feature: {0}")]
    Unsupported(String),

    #[error("End of stream")]
    EndOfStream,

    #[error("Truncated field: need {needed} bytes, {available} available")]
    TruncatedField { needed: usize, available: usize },

    #[error("Malformed packet header: {0}")]
    MalformedHeader(String),

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Short read: requested {requested} bytes, got {got}")]
    ShortRead { requested: usize, got: usize },

    #[error("Extension {extension} has unexpected data size {size}")]
    ExtensionSizeMismatch { extension: Guid, size: u16 },
}

/// How far an error propagates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Only the current payload is affected.
    Payload,
    /// The current packet is abandoned; decoding resumes at the next packet.
    Packet,
    /// The session cannot continue.
    Session,
}

impl DemuxError {
    pub fn severity(&self) -> Severity {
        match self {
            DemuxError::ExtensionSizeMismatch { .. } => Severity::Payload,
            DemuxError::TruncatedField { .. }
            | DemuxError::MalformedHeader(_)
            | DemuxError::MalformedPayload(_) => Severity::Packet,
            DemuxError::Io(_)
            | DemuxError::InvalidData(_)
            | DemuxError::Unsupported(_)
            | DemuxError::EndOfStream
            | DemuxError::ShortRead { .. } => Severity::Session,
        }
    }
}

pub type Result<T> = std::result::Result<T, DemuxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severities() {
        assert_eq!(
            DemuxError::TruncatedField { needed: 4, available: 1 }.severity(),
            Severity::Packet
        );
        assert_eq!(DemuxError::MalformedPayload("x".into()).severity(), Severity::Packet);
        assert_eq!(DemuxError::ShortRead { requested: 8, got: 0 }.severity(), Severity::Session);
        assert_eq!(
            DemuxError::ExtensionSizeMismatch { extension: Guid([0; 16]), size: 3 }.severity(),
            Severity::Payload
        );
    }
}
