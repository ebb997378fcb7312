//! Protocol Messages
//!
//! Wire format for peer-to-peer traffic. Every message is a JSON object with
//! a `type` discriminator; blocks travel with the same field names as their
//! canonical encoding.

use serde::{Deserialize, Serialize};

use crate::chain::block::Block;
use crate::core::party::Party;

/// Messages exchanged between the two peers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PeerMessage {
    /// Handshake step 1: our public key (base64).
    #[serde(rename = "pubkey")]
    PubKey {
        /// Exported public key.
        key: String,
    },

    /// Handshake step 2: commitment to our random seed.
    #[serde(rename = "commit")]
    Commit {
        /// Hex SHA-256 of the seed.
        commit: String,
    },

    /// Handshake step 3: the seed itself.
    #[serde(rename = "random")]
    Random {
        /// Hex seed.
        random: String,
    },

    /// Handshake step 4: our signature over the genesis frame.
    #[serde(rename = "genesis_sig")]
    GenesisSig {
        /// Hex signature.
        signature: String,
    },

    /// A signed move block.
    #[serde(rename = "move")]
    Move {
        /// The block, carrying the mover's signature.
        block: Block,
    },

    /// Our signature over the current round's score frame.
    #[serde(rename = "score_sig")]
    ScoreSig {
        /// Hex signature.
        signature: String,
    },

    /// Host starts the next round.
    #[serde(rename = "newround")]
    NewRound {
        /// Party playing fox in the new round.
        starter: Party,
    },

    /// Guest asks the host for another round.
    #[serde(rename = "requestnewgame")]
    RequestNewGame,
}

impl PeerMessage {
    /// Wire name of this message, for logs and errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            PeerMessage::PubKey { .. } => "pubkey",
            PeerMessage::Commit { .. } => "commit",
            PeerMessage::Random { .. } => "random",
            PeerMessage::GenesisSig { .. } => "genesis_sig",
            PeerMessage::Move { .. } => "move",
            PeerMessage::ScoreSig { .. } => "score_sig",
            PeerMessage::NewRound { .. } => "newround",
            PeerMessage::RequestNewGame => "requestnewgame",
        }
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}
