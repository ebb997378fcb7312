//! Hash-linked chain.
//!
//! Frames are the signed payloads, blocks attach signatures, the ledger
//! validates and appends, and the audit replays a finished chain.

pub mod audit;
pub mod block;
pub mod frame;
pub mod ledger;

pub use audit::{audit_chain, verify_links, AuditReport, RoundSummary};
pub use block::{hash_block, Block};
pub use frame::{
    sign_frame, verify_frame, Frame, FrameKind, GenesisFrame, MoveFrame, ScoreFrame, SeedReveal,
};
pub use ledger::{Ledger, Round};
