//! Error types for composition jobs.
//!
//! Every fallible operation in the crate returns [`Result`], whose error is the
//! top-level [`Error`]. The variants of [`Error`] wrap one enum per concern so
//! callers can match on the category they care about (a relay task only needs
//! to know whether the peer went away, a loader only reports configuration
//! problems, and so on).
//!
//! # Examples
//!
//! ```
//! use pla_compose::error::{Error, TransportError};
//!
//! let err: Error = TransportError::ConnectionClosed.into();
//! assert!(err.is_connection_lost());
//! assert_eq!(err.to_string(), "transport error: connection closed");
//! ```

use std::path::PathBuf;

use crate::coordinator::JobState;
use crate::schedule::ParseInstructionError;

/// Result type used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Top-level error for composition jobs.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The byte stream to a peer failed or was closed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// A frame or payload did not match the wire format.
    #[error("protocol violation: {0}")]
    Protocol(#[from] ProtocolError),

    /// A Boolean function operation was given inconsistent input.
    #[error("function error: {0}")]
    Function(#[from] FunctionError),

    /// A module lookup or tree operation failed.
    #[error("module error: {0}")]
    Module(#[from] ModuleError),

    /// Configuration could not be read or is invalid.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The coordinator could not complete the job.
    #[error("job error: {0}")]
    Job(#[from] JobError),

    /// A worker program could not be parsed.
    #[error("invalid program: {0}")]
    Program(#[from] ParseInstructionError),
}

impl Error {
    /// Returns `true` when the error means a peer connection is gone.
    pub fn is_connection_lost(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Returns `true` when the error is a wire-format violation.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(self, Self::Protocol(_))
    }
}

/// Failures of the underlying byte stream.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The peer closed the connection (EOF) or the transport was closed locally.
    #[error("connection closed")]
    ConnectionClosed,

    /// Any other I/O failure on the stream.
    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// Folds an I/O error into a transport error, mapping EOF-like kinds to
    /// [`TransportError::ConnectionClosed`].
    pub fn from_io(err: std::io::Error) -> Self {
        use std::io::ErrorKind;
        match err.kind() {
            ErrorKind::UnexpectedEof
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe => Self::ConnectionClosed,
            _ => Self::Io(err),
        }
    }
}

/// Wire-format violations.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The frame header declares more or fewer bytes than the frame holds.
    #[error("frame declares {declared} payload bytes but {available} are available")]
    LengthMismatch {
        /// Length announced by the header.
        declared: u64,
        /// Bytes actually present after the header.
        available: u64,
    },

    /// The buffer ended before a field could be read.
    #[error("truncated {what}: need {needed} bytes, have {remaining}")]
    Truncated {
        /// Name of the field being decoded.
        what: &'static str,
        /// Bytes required by the field.
        needed: usize,
        /// Bytes left in the buffer.
        remaining: usize,
    },

    /// Bytes were left over after a payload was fully decoded.
    #[error("{count} trailing bytes after {what}")]
    TrailingBytes {
        /// Name of the payload.
        what: &'static str,
        /// Number of unread bytes.
        count: usize,
    },

    /// A count or length field is negative or impossibly large.
    #[error("invalid {what}: {value}")]
    InvalidLength {
        /// Name of the field.
        what: &'static str,
        /// Raw value read from the wire.
        value: i64,
    },

    /// A target id below the reserved sentinels.
    #[error("invalid target id {0}")]
    InvalidTarget(i32),

    /// A string payload was not valid UTF-8 or lacked its terminator.
    #[error("invalid string payload: {0}")]
    InvalidString(String),

    /// A function table carried a byte outside its alphabet.
    #[error("invalid {what} byte 0x{byte:02x}")]
    InvalidByte {
        /// `"literal"` or `"output"`.
        what: &'static str,
        /// Offending byte.
        byte: u8,
    },

    /// The output-bit counts in a function header disagree with its rows.
    #[error("output counts ({zeros}, {ones}) disagree with row tally ({tally_zeros}, {tally_ones})")]
    CountMismatch {
        /// Declared count of rows with output 0.
        zeros: i32,
        /// Declared count of rows with output 1.
        ones: i32,
        /// Actual count of rows with output 0.
        tally_zeros: usize,
        /// Actual count of rows with output 1.
        tally_ones: usize,
    },
}

/// Inconsistent input to the function algebra.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum FunctionError {
    /// A merge position is outside the parent's variables.
    #[error("position {position} out of range for {var_count} variables")]
    PositionOutOfRange {
        /// Requested substitution position.
        position: usize,
        /// Number of variables of the parent function.
        var_count: usize,
    },

    /// A row's width differs from the table's variable count.
    #[error("row has {actual} literals, table expects {expected}")]
    RowWidth {
        /// Table variable count.
        expected: usize,
        /// Literals in the offending row.
        actual: usize,
    },

    /// A character outside `{0, 1, -}` appeared in a row.
    #[error("invalid literal {0:?}")]
    InvalidLiteral(char),

    /// A character outside `{0, 1}` was given as an output bit.
    #[error("invalid output bit {0:?}")]
    InvalidOutput(char),
}

/// Module lookup and tree-structure failures.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ModuleError {
    /// No module with the given name exists.
    #[error("module not found: {0}")]
    NotFound(String),

    /// A module with the given name already exists.
    #[error("duplicate module name: {0}")]
    Duplicate(String),

    /// The parent has no child link for the given module.
    #[error("module {parent} has no child {child}")]
    UnknownChild {
        /// Parent module name.
        parent: String,
        /// Child that was looked up.
        child: String,
    },

    /// The child is already attached to a parent.
    #[error("module {child} already has parent {parent}")]
    AlreadyAttached {
        /// Child module name.
        child: String,
        /// Existing parent.
        parent: String,
    },

    /// Attaching the child would create a cycle.
    #[error("attaching {child} under {parent} would create a cycle")]
    Cycle {
        /// Prospective parent.
        parent: String,
        /// Prospective child.
        child: String,
    },

    /// A child position is outside the parent's variables.
    #[error("child {child} of {parent} sits at position {position} but {parent} has {var_count} variables")]
    PositionOutOfRange {
        /// Parent module name.
        parent: String,
        /// Child module name.
        child: String,
        /// Recorded position.
        position: usize,
        /// Parent variable count.
        var_count: usize,
    },

    /// Parent and child links disagree.
    #[error("module {child} is listed under {parent} but points to {actual:?}")]
    InconsistentLink {
        /// Parent holding the child link.
        parent: String,
        /// Child named by the link.
        child: String,
        /// Parent recorded on the child.
        actual: Option<String>,
    },
}

/// Configuration failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config TOML: {source}")]
    Parse {
        /// Underlying parser error.
        #[from]
        source: toml::de::Error,
    },

    /// The file could not be read.
    #[error("failed to read '{path}': {source}")]
    Io {
        /// Underlying I/O error.
        source: std::io::Error,
        /// Path that failed.
        path: PathBuf,
    },

    /// Parsed successfully but holds invalid values.
    #[error("config validation error: {message}")]
    Validation {
        /// Description of the problem.
        message: String,
    },

    /// A PLA source file is malformed.
    #[error("{path}:{line}: {message}")]
    Pla {
        /// PLA file path.
        path: PathBuf,
        /// 1-based line number.
        line: usize,
        /// Description of the problem.
        message: String,
    },
}

/// Coordinator-level failures that end a job.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    /// A worker was found disconnected before a dispatch send.
    #[error("worker {worker} disconnected during dispatch")]
    WorkerDisconnected {
        /// Worker id.
        worker: usize,
    },

    /// A relayed message named a worker that is not part of the job.
    #[error("worker {from} addressed unknown worker {target}")]
    UnknownTarget {
        /// Worker that sent the message.
        from: usize,
        /// Address carried by the envelope.
        target: i32,
    },

    /// A relay task failed.
    #[error("relay for worker {worker} failed: {source}")]
    Relay {
        /// Worker the relay served.
        worker: usize,
        /// Underlying failure.
        #[source]
        source: Box<Error>,
    },

    /// A job state transition was rejected.
    #[error("invalid job transition from {from} to {to}")]
    InvalidTransition {
        /// Current state.
        from: JobState,
        /// Requested state.
        to: JobState,
    },

    /// The job needs at least one worker.
    #[error("a job needs at least one worker")]
    NoWorkers,

    /// A relay task panicked or was cancelled.
    #[error("relay task did not finish: {message}")]
    TaskJoin {
        /// Join error text.
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eof_maps_to_connection_closed() {
        let io = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
        assert!(matches!(
            TransportError::from_io(io),
            TransportError::ConnectionClosed
        ));

        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope");
        assert!(matches!(TransportError::from_io(io), TransportError::Io(_)));
    }

    #[test]
    fn error_categories() {
        let err: Error = ProtocolError::InvalidString("bad".into()).into();
        assert!(err.is_protocol_violation());
        assert!(!err.is_connection_lost());

        let err: Error = ModuleError::NotFound("M1".into()).into();
        assert_eq!(err.to_string(), "module error: module not found: M1");
    }

    #[test]
    fn length_mismatch_message() {
        let err = ProtocolError::LengthMismatch {
            declared: 10,
            available: 4,
        };
        assert_eq!(
            err.to_string(),
            "frame declares 10 payload bytes but 4 are available"
        );
    }
}
