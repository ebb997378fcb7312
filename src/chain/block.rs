//! Blocks
//!
//! A block is a frame plus the signatures attesting to it. Signatures are
//! never part of the hash: the same frame hashes identically however many
//! parties signed it.

use serde::{Deserialize, Serialize};

use crate::core::keys::KeyPair;
use crate::core::party::Party;

use super::frame::{sign_frame, Frame};

/// Signed frame.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Hashed, signed payload.
    pub frame: Frame,
    /// Hex signatures. Genesis/score: host then guest. Move: mover only.
    pub signatures: Vec<String>,
}

impl Block {
    /// Wrap a frame with its signatures.
    pub fn new(frame: Frame, signatures: Vec<String>) -> Self {
        Self { frame, signatures }
    }

    /// Sign `frame` with a single key (moves, and everything in local play).
    pub fn single(frame: Frame, keys: &KeyPair) -> Self {
        let signature = sign_frame(&frame, keys);
        Self::new(frame, vec![signature])
    }

    /// Assemble a two-party block from our signature and the peer's.
    ///
    /// Signatures are ordered host first, guest second.
    pub fn cosigned(frame: Frame, me: Party, mine: String, peers: String) -> Self {
        let signatures = match me {
            Party::Host => vec![mine, peers],
            Party::Guest => vec![peers, mine],
        };
        Self::new(frame, signatures)
    }

    /// Content hash of this block (hash of the frame only).
    pub fn hash(&self) -> String {
        hash_block(self)
    }
}

/// Hash of a block: SHA-256 of the frame's canonical encoding, hex.
pub fn hash_block(block: &Block) -> String {
    block.frame.hash()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::board::Winner;

    #[test]
    fn test_hash_ignores_signatures() {
        let frame = Frame::score("00", Party::Host, Winner::Fox);
        let a = Block::new(frame.clone(), vec![]);
        let b = Block::new(frame.clone(), vec!["aa".into(), "bb".into()]);
        let c = Block::single(frame, &KeyPair::from_secret(&[1; 32]));

        assert_eq!(hash_block(&a), hash_block(&b));
        assert_eq!(hash_block(&a), hash_block(&c));
    }

    #[test]
    fn test_cosigned_order() {
        let frame = Frame::score("00", Party::Host, Winner::Draw);

        let as_host = Block::cosigned(frame.clone(), Party::Host, "h".into(), "g".into());
        let as_guest = Block::cosigned(frame, Party::Guest, "g".into(), "h".into());

        assert_eq!(as_host.signatures, vec!["h".to_string(), "g".to_string()]);
        assert_eq!(as_host, as_guest);
    }

    #[test]
    fn test_block_json_shape() {
        let block = Block::new(Frame::new_move(1, 2, Party::Guest, "ab"), vec!["cd".into()]);
        let value = serde_json::to_value(&block).unwrap();

        assert_eq!(value["frame"]["type"], "move");
        assert_eq!(value["frame"]["move"], 2);
        assert_eq!(value["signatures"][0], "cd");

        let parsed: Block = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, block);
    }
}
