//! Protocol errors.
//!
//! Every variant is fail-stop: the session that raised it is torn down and
//! its chain discarded. Nothing here is retried.

use thiserror::Error;

use crate::chain::frame::FrameKind;
use crate::core::keys::KeyError;
use crate::core::party::Party;

/// A check on peer data (or our own chain) failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Revealed random does not hash to the announced commitment.
    #[error("peer's revealed random does not match its commitment")]
    CommitMismatch,

    /// Peer announced our own commitment back to us.
    #[error("peer's commitment repeats our own")]
    MirroredCommit,

    /// A signature failed verification.
    #[error("invalid signature on {frame} frame")]
    SignatureInvalid {
        /// Frame the signature was for.
        frame: FrameKind,
    },

    /// `previous_hash` does not match the preceding block.
    #[error("chain link mismatch: expected previous hash {expected}, got {got}")]
    ChainLinkMismatch {
        /// Hash of the actual preceding block.
        expected: String,
        /// Hash claimed by the frame.
        got: String,
    },

    /// A move was claimed by the party not holding the turn.
    #[error("wrong turn: expected {expected} to move, got {got}")]
    WrongTurn {
        /// Party holding the turn.
        expected: Party,
        /// Party claimed by the frame.
        got: Party,
    },

    /// Move index does not match the session counter.
    #[error("move index mismatch: expected {expected}, got {got}")]
    IndexMismatch {
        /// Next counter value.
        expected: u64,
        /// Index claimed by the frame.
        got: u64,
    },

    /// Move targets an out-of-range or occupied cell.
    #[error("invalid cell {cell}")]
    InvalidCell {
        /// Target cell as received.
        cell: i64,
    },

    /// Block frame is not the kind expected here.
    #[error("expected a {expected} frame, got {got}")]
    WrongFrameType {
        /// Kind required at this point.
        expected: FrameKind,
        /// Kind received.
        got: FrameKind,
    },

    /// A message arrived that the current state does not accept.
    #[error("unexpected '{got}' message while {state}")]
    UnexpectedMessage {
        /// What we were doing.
        state: &'static str,
        /// Message type received.
        got: &'static str,
    },

    /// Peer's public key could not be imported.
    #[error("malformed peer key: {0}")]
    MalformedKey(#[from] KeyError),

    /// A chain handed to the auditor is structurally unusable.
    #[error("malformed chain: {0}")]
    MalformedChain(String),

    /// Peer did not answer in time.
    #[error("timed out while {0}")]
    Timeout(&'static str),

    /// Peer closed the connection.
    #[error("peer disconnected")]
    Disconnected,

    /// Transport failure (I/O, WebSocket, undecodable message).
    #[error("transport error: {0}")]
    Transport(String),
}
