//! Move Ledger
//!
//! Append-only, hash-linked chain for one session, plus the state needed to
//! validate the next block: the move counter and the current round's board.
//!
//! Checks run in a fixed order on every remote move:
//! 1. Frame type
//! 2. Chain link
//! 3. Turn
//! 4. Index
//! 5. Cell
//! 6. Signature
//!
//! Only when all pass is the block appended.

use tracing::debug;

use crate::core::hash::short;
use crate::core::keys::{KeyPair, PublicKey};
use crate::core::party::Party;
use crate::error::ProtocolError;
use crate::game::board::{Board, GameStatus, Role};

use super::block::Block;
use super::frame::{verify_frame, Frame, FrameKind, GenesisFrame, ScoreFrame};

/// State of the round currently being played.
#[derive(Clone, Debug)]
pub struct Round {
    /// Party playing fox.
    pub starter: Party,
    /// Board for this round.
    pub board: Board,
    /// Score block committed for this round.
    pub scored: bool,
}

impl Round {
    fn new(starter: Party) -> Self {
        Self {
            starter,
            board: Board::new(),
            scored: false,
        }
    }
}

/// One session's chain and validation state.
#[derive(Clone, Debug)]
pub struct Ledger {
    blocks: Vec<Block>,
    tip: String,
    next_index: u64,
    round: Round,
}

impl Ledger {
    /// Start a chain from its genesis block. The move counter starts at 0.
    pub fn new(genesis: Block) -> Result<Self, ProtocolError> {
        match genesis.frame {
            Frame::Genesis(frame) => Ok(Self::open(frame, genesis.signatures)),
            other => Err(ProtocolError::WrongFrameType {
                expected: FrameKind::Genesis,
                got: other.kind(),
            }),
        }
    }

    /// Start a chain from a genesis frame and its signatures.
    pub fn open(genesis: GenesisFrame, signatures: Vec<String>) -> Self {
        let first_player = genesis.first_player;
        let block = Block::new(Frame::Genesis(genesis), signatures);
        Self {
            tip: block.hash(),
            blocks: vec![block],
            next_index: 0,
            round: Round::new(first_player),
        }
    }

    /// All blocks, genesis first.
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Number of blocks.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// A ledger always holds its genesis block.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Hash of the last block.
    pub fn tip_hash(&self) -> &str {
        &self.tip
    }

    /// Index the next move must carry.
    pub fn next_index(&self) -> u64 {
        self.next_index
    }

    /// Current round.
    pub fn round(&self) -> &Round {
        &self.round
    }

    /// Result of the current round so far.
    pub fn status(&self) -> GameStatus {
        self.round.board.status()
    }

    /// Party that must make the next move.
    pub fn turn_holder(&self) -> Party {
        self.round.board.to_move().party(self.round.starter)
    }

    /// Role that must make the next move.
    pub fn role_to_move(&self) -> Role {
        self.round.board.to_move()
    }

    fn push(&mut self, block: Block) {
        self.tip = block.hash();
        debug!(
            "Appended {} block #{} ({})",
            block.frame.kind(),
            self.blocks.len(),
            short(&self.tip)
        );
        self.blocks.push(block);
    }

    fn ensure_round_open(&self, got: &'static str) -> Result<(), ProtocolError> {
        if self.status().is_over() {
            return Err(ProtocolError::UnexpectedMessage {
                state: "the round is over",
                got,
            });
        }
        Ok(())
    }

    /// Build, sign and append a move for the party holding the turn.
    ///
    /// Returns the block for transmission and the round status after it.
    pub fn record_local_move(
        &mut self,
        cell: u8,
        keys: &KeyPair,
    ) -> Result<(Block, GameStatus), ProtocolError> {
        self.ensure_round_open("move")?;
        self.round
            .board
            .check_open(cell)
            .map_err(|_| ProtocolError::InvalidCell { cell: cell.into() })?;

        let role = self.role_to_move();
        let frame = Frame::new_move(self.next_index, cell, self.turn_holder(), self.tip.clone());
        let block = Block::single(frame, keys);

        self.round
            .board
            .place(cell, role)
            .map_err(|_| ProtocolError::InvalidCell { cell: cell.into() })?;
        self.next_index += 1;
        self.push(block.clone());

        Ok((block, self.status()))
    }

    /// Validate a move block signed by `signer` and append it.
    pub fn accept_remote_move(
        &mut self,
        block: Block,
        signer: &PublicKey,
    ) -> Result<GameStatus, ProtocolError> {
        self.ensure_round_open("move")?;
        self.validate_move(&block, signer)?;

        let Frame::Move(ref frame) = block.frame else {
            return Err(ProtocolError::WrongFrameType {
                expected: FrameKind::Move,
                got: block.frame.kind(),
            });
        };
        let invalid = ProtocolError::InvalidCell { cell: frame.cell };
        let cell = frame.board_cell().ok_or_else(|| invalid.clone())?;
        let role = self.role_to_move();
        self.round.board.place(cell, role).map_err(|_| invalid)?;
        self.next_index += 1;
        self.push(block);

        Ok(self.status())
    }

    /// Run every move check without mutating anything.
    pub fn validate_move(&self, block: &Block, signer: &PublicKey) -> Result<(), ProtocolError> {
        let frame = match &block.frame {
            Frame::Move(m) => m,
            other => {
                return Err(ProtocolError::WrongFrameType {
                    expected: FrameKind::Move,
                    got: other.kind(),
                })
            }
        };

        if frame.previous_hash != self.tip {
            return Err(ProtocolError::ChainLinkMismatch {
                expected: self.tip.clone(),
                got: frame.previous_hash.clone(),
            });
        }

        let expected = self.turn_holder();
        if frame.player != expected {
            return Err(ProtocolError::WrongTurn {
                expected,
                got: frame.player,
            });
        }

        if frame.index != self.next_index {
            return Err(ProtocolError::IndexMismatch {
                expected: self.next_index,
                got: frame.index,
            });
        }

        let invalid = || ProtocolError::InvalidCell { cell: frame.cell };
        let cell = frame.board_cell().ok_or_else(invalid)?;
        self.round.board.check_open(cell).map_err(|_| invalid())?;

        match block.signatures.as_slice() {
            [signature] if verify_frame(&block.frame, signature, signer) => Ok(()),
            _ => Err(ProtocolError::SignatureInvalid {
                frame: FrameKind::Move,
            }),
        }
    }

    /// The score frame both parties must sign for the finished round.
    ///
    /// `None` while the round is still in progress or already scored.
    pub fn pending_score_frame(&self) -> Option<Frame> {
        self.pending_score().map(Frame::Score)
    }

    /// Payload of [`Ledger::pending_score_frame`].
    pub fn pending_score(&self) -> Option<ScoreFrame> {
        if self.round.scored {
            return None;
        }
        Some(ScoreFrame {
            previous_hash: self.tip.clone(),
            starter: self.round.starter,
            winner: self.status().winner()?,
        })
    }

    /// Append the score block for the finished round.
    ///
    /// The frame must be exactly the one [`Ledger::pending_score_frame`]
    /// describes; signatures are checked by the caller.
    pub fn commit_score(&mut self, block: Block) -> Result<(), ProtocolError> {
        if block.frame.kind() != FrameKind::Score {
            return Err(ProtocolError::WrongFrameType {
                expected: FrameKind::Score,
                got: block.frame.kind(),
            });
        }

        let expected = self.pending_score_frame().ok_or(ProtocolError::UnexpectedMessage {
            state: "no round is waiting for a score",
            got: "score",
        })?;

        if block.frame.previous_hash() != Some(self.tip.as_str()) {
            return Err(ProtocolError::ChainLinkMismatch {
                expected: self.tip.clone(),
                got: block.frame.previous_hash().unwrap_or_default().to_string(),
            });
        }

        if block.frame != expected {
            return Err(ProtocolError::MalformedChain(format!(
                "score frame does not match the finished round (expected {:?})",
                expected
            )));
        }

        self.round.scored = true;
        self.push(block);
        Ok(())
    }

    /// Start the next round on the same chain. The move counter keeps going.
    pub fn begin_round(&mut self, starter: Party) -> Result<(), ProtocolError> {
        if !self.round.scored {
            return Err(ProtocolError::UnexpectedMessage {
                state: "the current round is not scored yet",
                got: "newround",
            });
        }
        self.round = Round::new(starter);
        Ok(())
    }
}
