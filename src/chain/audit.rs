//! Chain Audit
//!
//! Verify a finished chain by replay. Nothing is trusted from the chain
//! itself except what the signatures and the rules confirm.
//!
//! Two passes:
//! 1. Linkage: every `previous_hash` against the hash of its predecessor.
//! 2. Content: genesis exchange, then every move and score replayed through
//!    a fresh [`Ledger`].

use tracing::debug;

use crate::core::hash::short;
use crate::core::keys::PublicKey;
use crate::core::party::Party;
use crate::core::rng::{derive_first_player, open_commitment};
use crate::error::ProtocolError;
use crate::game::board::Winner;

use super::block::Block;
use super::frame::{verify_frame, Frame, FrameKind, GenesisFrame};
use super::ledger::Ledger;

/// One round as found in the chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoundSummary {
    /// Party that played fox.
    pub starter: Party,
    /// Moves played.
    pub moves: u32,
    /// Committed result (`None` if the chain ends mid-round).
    pub winner: Option<Winner>,
}

/// Audit result.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuditReport {
    /// Total blocks, genesis included.
    pub blocks: usize,
    /// Total moves across all rounds.
    pub moves: u64,
    /// Fox in the first round.
    pub first_player: Party,
    /// Whether both parties contributed to genesis.
    pub two_party: bool,
    /// Rounds in chain order.
    pub rounds: Vec<RoundSummary>,
    /// Hash of the last block.
    pub tip: String,
}

/// Keys that may sign blocks in an audited chain.
struct Signers<'a> {
    host: &'a PublicKey,
    guest: Option<&'a PublicKey>,
}

impl Signers<'_> {
    /// Key of the party that made a move. Local chains have a single key.
    fn mover(&self, party: Party) -> &PublicKey {
        match (party, self.guest) {
            (Party::Guest, Some(guest)) => guest,
            _ => self.host,
        }
    }

    /// Check a block that both parties sign (host then guest), or that
    /// only the host signs in a local chain.
    fn check_joint(&self, block: &Block) -> Result<(), ProtocolError> {
        let frame = &block.frame;
        let valid = match (self.guest, block.signatures.as_slice()) {
            (Some(guest), [host_sig, guest_sig]) => {
                verify_frame(frame, host_sig, self.host) && verify_frame(frame, guest_sig, guest)
            }
            (None, [host_sig]) => verify_frame(frame, host_sig, self.host),
            _ => false,
        };
        if valid {
            Ok(())
        } else {
            Err(ProtocolError::SignatureInvalid { frame: frame.kind() })
        }
    }
}

/// Check `previous_hash` of every block against its predecessor.
pub fn verify_links(blocks: &[Block]) -> Result<(), ProtocolError> {
    for pair in blocks.windows(2) {
        let expected = pair[0].hash();
        match pair[1].frame.previous_hash() {
            Some(got) if got == expected => {}
            Some(got) => {
                return Err(ProtocolError::ChainLinkMismatch {
                    expected,
                    got: got.to_string(),
                })
            }
            None => {
                return Err(ProtocolError::MalformedChain(
                    "genesis frame after the first block".into(),
                ))
            }
        }
    }
    Ok(())
}

fn check_genesis(genesis: &GenesisFrame, two_party: bool) -> Result<(), ProtocolError> {
    let host_random = open_commitment(&genesis.host.commit, &genesis.host.random)
        .ok_or(ProtocolError::CommitMismatch)?;

    match (&genesis.peer, two_party) {
        (Some(peer), true) => {
            if peer.commit.eq_ignore_ascii_case(&genesis.host.commit) {
                return Err(ProtocolError::MirroredCommit);
            }
            let peer_random = open_commitment(&peer.commit, &peer.random)
                .ok_or(ProtocolError::CommitMismatch)?;
            if derive_first_player(&host_random, &peer_random) != genesis.first_player {
                return Err(ProtocolError::MalformedChain(format!(
                    "first player {} does not follow from the revealed seeds",
                    genesis.first_player
                )));
            }
        }
        (None, false) => {
            if genesis.first_player != Party::Host {
                return Err(ProtocolError::MalformedChain(
                    "local genesis must start with the host".into(),
                ));
            }
        }
        (Some(_), false) => {
            return Err(ProtocolError::MalformedChain(
                "two-party genesis audited without the guest's key".into(),
            ))
        }
        (None, true) => {
            return Err(ProtocolError::MalformedChain(
                "local genesis audited with a guest key".into(),
            ))
        }
    }
    Ok(())
}

/// Audit a complete chain.
///
/// `guest_key` is `None` for local chains, where the host's key signs
/// everything.
pub fn audit_chain(
    blocks: &[Block],
    host_key: &PublicKey,
    guest_key: Option<&PublicKey>,
) -> Result<AuditReport, ProtocolError> {
    let genesis_block = blocks
        .first()
        .ok_or_else(|| ProtocolError::MalformedChain("empty chain".into()))?;
    let genesis = match &genesis_block.frame {
        Frame::Genesis(g) => g,
        other => {
            return Err(ProtocolError::WrongFrameType {
                expected: FrameKind::Genesis,
                got: other.kind(),
            })
        }
    };

    verify_links(blocks)?;

    let signers = Signers {
        host: host_key,
        guest: guest_key,
    };
    signers.check_joint(genesis_block)?;
    check_genesis(genesis, guest_key.is_some())?;

    let mut ledger = Ledger::new(genesis_block.clone())?;
    let mut rounds = vec![RoundSummary {
        starter: genesis.first_player,
        moves: 0,
        winner: None,
    }];

    for block in &blocks[1..] {
        match &block.frame {
            Frame::Genesis(_) => {
                return Err(ProtocolError::MalformedChain(
                    "genesis frame after the first block".into(),
                ))
            }
            Frame::Move(frame) => {
                // First move after a score opens the next round, with the
                // starter alternating.
                if ledger.round().scored {
                    let starter = ledger.round().starter.other();
                    ledger.begin_round(starter)?;
                    rounds.push(RoundSummary {
                        starter,
                        moves: 0,
                        winner: None,
                    });
                }
                ledger.accept_remote_move(block.clone(), signers.mover(frame.player))?;
                if let Some(round) = rounds.last_mut() {
                    round.moves += 1;
                }
            }
            Frame::Score(frame) => {
                signers.check_joint(block)?;
                ledger.commit_score(block.clone())?;
                if let Some(round) = rounds.last_mut() {
                    round.winner = Some(frame.winner);
                }
            }
        }
    }

    let report = AuditReport {
        blocks: blocks.len(),
        moves: ledger.next_index(),
        first_player: genesis.first_player,
        two_party: guest_key.is_some(),
        rounds,
        tip: ledger.tip_hash().to_string(),
    };
    debug!(
        "Audited {} blocks, {} rounds, tip {}",
        report.blocks,
        report.rounds.len(),
        short(&report.tip)
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::frame::{sign_frame, SeedReveal};
    use crate::core::keys::KeyPair;
    use crate::core::rng::SeedSecret;
    use crate::game::board::GameStatus;

    fn local_chain(cells: &[u8]) -> (Vec<Block>, KeyPair) {
        let keys = KeyPair::from_secret(&[9; 32]);
        let seed = SeedSecret::from_bytes([3; 32]);
        let genesis = Block::single(
            Frame::genesis(
                Party::Host,
                SeedReveal::new(seed.commitment(), seed.reveal()),
                None,
            ),
            &keys,
        );
        let mut ledger = Ledger::new(genesis).unwrap();
        for &cell in cells {
            if ledger.round().scored {
                let next = ledger.round().starter.other();
                ledger.begin_round(next).unwrap();
            }
            let (_, status) = ledger.record_local_move(cell, &keys).unwrap();
            if status.is_over() {
                let frame = ledger.pending_score_frame().unwrap();
                ledger.commit_score(Block::single(frame, &keys)).unwrap();
            }
        }
        (ledger.blocks().to_vec(), keys)
    }

    #[test]
    fn test_second_round_alternates_starter() {
        let (blocks, keys) = local_chain(&[0, 3, 1, 4, 2, 4]);
        let report = audit_chain(&blocks, &keys.public(), None).unwrap();

        assert_eq!(report.rounds.len(), 2);
        assert_eq!(report.rounds[1].starter, Party::Guest);
        assert_eq!(report.rounds[1].moves, 1);
        assert_eq!(report.moves, 6);
    }

    #[test]
    fn test_second_round_same_starter_rejected() {
        let keys = KeyPair::from_secret(&[9; 32]);
        let (blocks, _) = local_chain(&[0, 3, 1, 4, 2]);

        // Host opens round two again instead of the guest.
        let mut blocks = blocks;
        let tip = blocks.last().unwrap().hash();
        blocks.push(Block::single(Frame::new_move(5, 4, Party::Host, tip), &keys));

        assert_eq!(
            audit_chain(&blocks, &keys.public(), None),
            Err(ProtocolError::WrongTurn { expected: Party::Guest, got: Party::Host })
        );
    }

    #[test]
    fn test_local_chain_audits() {
        let (blocks, keys) = local_chain(&[0, 3, 1, 4, 2]);
        let report = audit_chain(&blocks, &keys.public(), None).unwrap();

        assert_eq!(report.blocks, 7);
        assert_eq!(report.moves, 5);
        assert!(!report.two_party);
        assert_eq!(
            report.rounds,
            vec![RoundSummary {
                starter: Party::Host,
                moves: 5,
                winner: Some(Winner::Fox),
            }]
        );
    }

    #[test]
    fn test_unfinished_round_reported() {
        let (blocks, keys) = local_chain(&[4, 0]);
        let report = audit_chain(&blocks, &keys.public(), None).unwrap();
        assert_eq!(report.rounds[0].winner, None);
        assert_eq!(report.rounds[0].moves, 2);
    }

    #[test]
    fn test_tampered_cell_detected_at_successor() {
        let (mut blocks, keys) = local_chain(&[0, 3, 1, 4, 2]);
        if let Frame::Move(ref mut m) = blocks[2].frame {
            m.cell = 8;
        }
        assert!(matches!(
            audit_chain(&blocks, &keys.public(), None),
            Err(ProtocolError::ChainLinkMismatch { .. })
        ));
    }

    #[test]
    fn test_tampered_tail_fails_signature() {
        let (mut blocks, keys) = local_chain(&[4, 0]);
        if let Frame::Move(ref mut m) = blocks[2].frame {
            m.cell = 8;
        }
        assert_eq!(
            audit_chain(&blocks, &keys.public(), None),
            Err(ProtocolError::SignatureInvalid { frame: FrameKind::Move })
        );
    }

    #[test]
    fn test_wrong_key_rejected() {
        let (blocks, _) = local_chain(&[4]);
        let stranger = KeyPair::from_secret(&[10; 32]);
        assert!(matches!(
            audit_chain(&blocks, &stranger.public(), None),
            Err(ProtocolError::SignatureInvalid { frame: FrameKind::Genesis })
        ));
    }

    #[test]
    fn test_empty_and_headless_chains() {
        let keys = KeyPair::from_secret(&[9; 32]);
        assert!(matches!(
            audit_chain(&[], &keys.public(), None),
            Err(ProtocolError::MalformedChain(_))
        ));

        let headless = vec![Block::single(Frame::new_move(0, 4, Party::Host, "00"), &keys)];
        assert!(matches!(
            audit_chain(&headless, &keys.public(), None),
            Err(ProtocolError::WrongFrameType { .. })
        ));
    }

    #[test]
    fn test_bad_reveal_in_genesis() {
        let keys = KeyPair::from_secret(&[9; 32]);
        let genesis = Block::single(
            Frame::genesis(Party::Host, SeedReveal::new("a".repeat(64), "b".repeat(64)), None),
            &keys,
        );
        assert_eq!(
            audit_chain(&[genesis], &keys.public(), None),
            Err(ProtocolError::CommitMismatch)
        );
    }

    #[test]
    fn test_mirrored_seeds_in_genesis() {
        let host = KeyPair::from_secret(&[9; 32]);
        let guest = KeyPair::from_secret(&[8; 32]);
        let seed = SeedSecret::from_bytes([3; 32]);
        let reveal = || SeedReveal::new(seed.commitment(), seed.reveal());

        let frame = Frame::genesis(Party::Host, reveal(), Some(reveal()));
        let genesis = Block::cosigned(
            frame.clone(),
            Party::Host,
            sign_frame(&frame, &host),
            sign_frame(&frame, &guest),
        );
        assert_eq!(
            audit_chain(&[genesis], &host.public(), Some(&guest.public())),
            Err(ProtocolError::MirroredCommit)
        );
    }

    #[test]
    fn test_links_helper() {
        let (blocks, _) = local_chain(&[0, 3, 1, 4, 2]);
        assert!(verify_links(&blocks).is_ok());
        assert!(verify_links(&blocks[..1]).is_ok());

        let mut swapped = blocks.clone();
        swapped.swap(2, 3);
        assert!(verify_links(&swapped).is_err());

        let ledger = Ledger::new(blocks[0].clone()).unwrap();
        assert_eq!(ledger.status(), GameStatus::InProgress);
    }
}
