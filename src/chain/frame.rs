//! Frames
//!
//! The hashed, signed payload of every block. Three kinds exist and every
//! consumer matches on all of them, so a new kind is a compile-time change.
//!
//! Field names are the wire names; the canonical encoding of a frame is the
//! sorted-key JSON of exactly these fields plus the `type` tag.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::core::canonical::canonical_bytes;
use crate::core::hash::sha256_hex;
use crate::core::keys::{KeyPair, PublicKey};
use crate::core::party::Party;
use crate::game::board::{Winner, BOARD_SIZE};

/// One party's commitment and the value it revealed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedReveal {
    /// Hex SHA-256 of the random bytes, published first.
    pub commit: String,
    /// Hex of the random bytes, published after both commits.
    pub random: String,
}

impl SeedReveal {
    /// Build from commitment and reveal.
    pub fn new(commit: impl Into<String>, random: impl Into<String>) -> Self {
        Self {
            commit: commit.into(),
            random: random.into(),
        }
    }
}

/// First frame of every chain: records the fair-start exchange.
///
/// `peer` is absent in local play, where nobody else contributed randomness.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "GenesisWire", try_from = "GenesisWire")]
pub struct GenesisFrame {
    /// Party playing fox in the first round.
    pub first_player: Party,
    /// Host's contribution.
    pub host: SeedReveal,
    /// Guest's contribution (`None` in local play).
    pub peer: Option<SeedReveal>,
}

/// Flat wire layout of [`GenesisFrame`].
#[derive(Serialize, Deserialize)]
struct GenesisWire {
    first_player: Party,
    host_commit: String,
    host_random: String,
    peer_commit: Option<String>,
    peer_random: Option<String>,
}

impl From<GenesisFrame> for GenesisWire {
    fn from(frame: GenesisFrame) -> Self {
        let (peer_commit, peer_random) = match frame.peer {
            Some(SeedReveal { commit, random }) => (Some(commit), Some(random)),
            None => (None, None),
        };
        Self {
            first_player: frame.first_player,
            host_commit: frame.host.commit,
            host_random: frame.host.random,
            peer_commit,
            peer_random,
        }
    }
}

impl TryFrom<GenesisWire> for GenesisFrame {
    type Error = String;

    fn try_from(wire: GenesisWire) -> Result<Self, Self::Error> {
        let peer = match (wire.peer_commit, wire.peer_random) {
            (Some(commit), Some(random)) => Some(SeedReveal { commit, random }),
            (None, None) => None,
            _ => return Err("peer_commit and peer_random must both be set or both be null".into()),
        };
        Ok(Self {
            first_player: wire.first_player,
            host: SeedReveal::new(wire.host_commit, wire.host_random),
            peer,
        })
    }
}

/// A single move, signed by the mover.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveFrame {
    /// Session-wide move counter; never reset between rounds.
    pub index: u64,
    /// Target cell. Any integer decodes; the ledger rejects values outside 0-8.
    #[serde(rename = "move")]
    pub cell: i64,
    /// Party making the move.
    pub player: Party,
    /// Hash of the preceding block's frame.
    pub previous_hash: String,
}

impl MoveFrame {
    /// Target as a board index, or `None` if it is off the board.
    pub fn board_cell(&self) -> Option<u8> {
        u8::try_from(self.cell)
            .ok()
            .filter(|&cell| usize::from(cell) < BOARD_SIZE)
    }
}

/// Result of a round, signed by both parties.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreFrame {
    /// Hash of the preceding block's frame.
    pub previous_hash: String,
    /// Party that played fox this round.
    pub starter: Party,
    /// Round result.
    pub winner: Winner,
}

/// Frame kinds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Frame {
    /// Chain root.
    Genesis(GenesisFrame),
    /// One move.
    Move(MoveFrame),
    /// Round result.
    Score(ScoreFrame),
}

/// Discriminant of a [`Frame`], for error reporting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameKind {
    /// Genesis frame.
    Genesis,
    /// Move frame.
    Move,
    /// Score frame.
    Score,
}

impl std::fmt::Display for FrameKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameKind::Genesis => write!(f, "genesis"),
            FrameKind::Move => write!(f, "move"),
            FrameKind::Score => write!(f, "score"),
        }
    }
}

impl Frame {
    /// Genesis frame constructor.
    pub fn genesis(first_player: Party, host: SeedReveal, peer: Option<SeedReveal>) -> Self {
        Frame::Genesis(GenesisFrame {
            first_player,
            host,
            peer,
        })
    }

    /// Move frame constructor.
    pub fn new_move(index: u64, cell: u8, player: Party, previous_hash: impl Into<String>) -> Self {
        Frame::Move(MoveFrame {
            index,
            cell: cell.into(),
            player,
            previous_hash: previous_hash.into(),
        })
    }

    /// Score frame constructor.
    pub fn score(previous_hash: impl Into<String>, starter: Party, winner: Winner) -> Self {
        Frame::Score(ScoreFrame {
            previous_hash: previous_hash.into(),
            starter,
            winner,
        })
    }

    /// Which kind of frame this is.
    pub fn kind(&self) -> FrameKind {
        match self {
            Frame::Genesis(_) => FrameKind::Genesis,
            Frame::Move(_) => FrameKind::Move,
            Frame::Score(_) => FrameKind::Score,
        }
    }

    /// Link to the previous block (genesis has none).
    pub fn previous_hash(&self) -> Option<&str> {
        match self {
            Frame::Genesis(_) => None,
            Frame::Move(m) => Some(&m.previous_hash),
            Frame::Score(s) => Some(&s.previous_hash),
        }
    }

    /// JSON object form, including the `type` tag.
    pub fn to_value(&self) -> Value {
        match self {
            Frame::Genesis(g) => json!({
                "type": "genesis",
                "first_player": g.first_player.index(),
                "host_commit": g.host.commit,
                "host_random": g.host.random,
                "peer_commit": g.peer.as_ref().map(|p| p.commit.as_str()),
                "peer_random": g.peer.as_ref().map(|p| p.random.as_str()),
            }),
            Frame::Move(m) => json!({
                "type": "move",
                "index": m.index,
                "move": m.cell,
                "player": m.player.index(),
                "previous_hash": m.previous_hash,
            }),
            Frame::Score(s) => json!({
                "type": "score",
                "previous_hash": s.previous_hash,
                "starter": s.starter.index(),
                "winner": s.winner.as_str(),
            }),
        }
    }

    /// Bytes that are hashed and signed.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        canonical_bytes(&self.to_value())
    }

    /// Content hash (hex). Independent of any signatures.
    pub fn hash(&self) -> String {
        sha256_hex(&self.canonical_bytes())
    }
}

/// Sign a frame's canonical encoding.
pub fn sign_frame(frame: &Frame, keys: &KeyPair) -> String {
    keys.sign_hex(&frame.canonical_bytes())
}

/// Verify a hex signature over a frame's canonical encoding.
pub fn verify_frame(frame: &Frame, signature_hex: &str, key: &PublicKey) -> bool {
    key.verify_hex(&frame.canonical_bytes(), signature_hex)
}
