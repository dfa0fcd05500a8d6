//! Message fabric shared by the coordinator and workers: frames, payload
//! codecs and the transport abstraction.

pub mod codec;
pub mod frame;
pub mod transport;

pub use codec::{decode_all, Payload, PayloadKind, Wire};
pub use frame::{Address, Envelope, TARGET_DONE, TARGET_RESULT};
pub use transport::{Connection, FrameReader, FrameWriter, PeerStream, Transport};

/// Instruction text that tells a worker it has no work and should
/// disconnect.
///
/// Workers compare the whole text. Older coordinators sent the free-form
/// `"Client closing"` instead; that text is not a directive here and fails
/// to parse as a program.
pub const CLOSE_DIRECTIVE: &str = "CLOSE";
