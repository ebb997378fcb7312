//! # Kettu Peer
//!
//! Two-party fox-and-rabbit tic-tac-toe with a verifiable record: a
//! commit-reveal fair start and a signed, hash-linked move chain that both
//! players hold and either can audit.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        KETTU PEER                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Primitives (pure)                         │
//! │  ├── canonical.rs- Sorted-key JSON encoding                  │
//! │  ├── hash.rs     - SHA-256 digests, hex                      │
//! │  ├── keys.rs     - Ed25519 keys, signatures                  │
//! │  ├── party.rs    - Host / guest                              │
//! │  └── rng.rs      - Seeds, commitments, first player          │
//! │                                                              │
//! │  game/           - Rules (pure)                              │
//! │  └── board.rs    - Board, roles, win detection               │
//! │                                                              │
//! │  chain/          - Verifiable record                         │
//! │  ├── frame.rs    - Genesis / move / score frames             │
//! │  ├── block.rs    - Frames with signatures                    │
//! │  ├── ledger.rs   - Validation and append                     │
//! │  └── audit.rs    - Full-chain replay                         │
//! │                                                              │
//! │  network/        - Peer link (async)                         │
//! │  ├── protocol.rs - Wire messages                             │
//! │  ├── transport.rs- In-memory and WebSocket transports        │
//! │  ├── handshake.rs- Fair-start state machine                  │
//! │  ├── session.rs  - One party's game                          │
//! │  └── server.rs   - Connect, listen, session driver           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Trust Model
//!
//! Neither peer trusts the other:
//! - Nobody picks the first player: it is derived from both revealed seeds,
//!   each committed to before either was shown
//! - Every move is signed by its mover and names the hash of the block before
//!   it, so history cannot be rewritten without breaking the next link
//! - Round results are only final once both players have signed them
//!
//! Any failed check is fatal. The session is aborted and its chain discarded.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod chain;
pub mod config;
pub mod core;
pub mod error;
pub mod game;
pub mod network;

// Re-export commonly used types
pub use crate::chain::{audit_chain, hash_block, AuditReport, Block, Frame, Ledger};
pub use crate::config::{ConfigError, PeerConfig};
pub use crate::core::{KeyPair, Party, PublicKey, SeedSecret};
pub use crate::error::ProtocolError;
pub use crate::game::{Board, GameStatus, Role, Winner};
pub use crate::network::{Command, PeerMessage, Session, SessionError, SessionEvent};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
