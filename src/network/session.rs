//! Game Session
//!
//! All state of one party's game: keys, peer key, chain and the score being
//! co-signed. Methods are synchronous; each returns a [`Reaction`] listing
//! what to send to the peer and what to tell the player. The async driver
//! in `server.rs` moves messages between this and the transport.
//!
//! A protocol failure poisons the session: every later call returns
//! [`SessionError::Aborted`].

use tracing::{debug, info, warn};

use crate::chain::block::Block;
use crate::chain::frame::{sign_frame, verify_frame, Frame, FrameKind, GenesisFrame, SeedReveal};
use crate::chain::ledger::Ledger;
use crate::core::hash::short;
use crate::core::keys::{KeyPair, PublicKey};
use crate::core::party::Party;
use crate::core::rng::SeedSecret;
use crate::error::ProtocolError;
use crate::game::board::{Board, GameStatus, Role, Winner};
use crate::network::handshake::HandshakeOutcome;
use crate::network::protocol::PeerMessage;

// =============================================================================
// ERRORS & EVENTS
// =============================================================================

/// Errors from session calls.
///
/// `Protocol` is fatal; the rest are local misuse and leave the session
/// untouched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// Peer data failed a check. The session is now aborted.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The other party holds the turn.
    #[error("It is not your turn")]
    NotYourTurn,

    /// Cell is out of range or taken.
    #[error("Cell {0} is not available")]
    CellUnavailable(u8),

    /// The round has finished; start a new one first.
    #[error("The round is over")]
    RoundOver,

    /// The round has not finished and been scored yet.
    #[error("The round is still in progress")]
    RoundInProgress,

    /// Only the host starts rounds.
    #[error("Only the host can start a round")]
    NotHost,

    /// Session failed earlier.
    #[error("Session aborted")]
    Aborted,
}

/// Something the player should be told about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A move was appended.
    MovePlayed {
        /// Session-wide index.
        index: u64,
        /// Party that moved.
        party: Party,
        /// Its role this round.
        role: Role,
        /// Target cell.
        cell: u8,
    },
    /// A round finished on the board.
    RoundOver {
        /// Fox this round.
        starter: Party,
        /// Result.
        winner: Winner,
    },
    /// The score block is on the chain.
    ScoreCommitted {
        /// Result.
        winner: Winner,
        /// Hash of the score block.
        hash: String,
    },
    /// A new round began.
    RoundStarted {
        /// Fox this round.
        starter: Party,
    },
    /// A local command was refused; the session carries on.
    Rejected {
        /// Why.
        reason: String,
    },
    /// The session ended with a failure.
    Aborted {
        /// Human-readable reason.
        reason: String,
    },
}

/// Result of one session call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reaction {
    /// Messages for the peer, in order.
    pub outgoing: Vec<PeerMessage>,
    /// Events for the player, in order.
    pub events: Vec<SessionEvent>,
}

impl Reaction {
    fn send(&mut self, message: PeerMessage) {
        self.outgoing.push(message);
    }

    fn emit(&mut self, event: SessionEvent) {
        self.events.push(event);
    }
}

/// Our signature over the finished round's score frame, waiting for the peer's.
#[derive(Debug, Clone)]
struct PendingScore {
    frame: Frame,
    winner: Winner,
    signature: String,
}

// =============================================================================
// SESSION
// =============================================================================

/// One party's game.
#[derive(Debug)]
pub struct Session {
    party: Party,
    keys: KeyPair,
    /// `None` in local play.
    peer_key: Option<PublicKey>,
    ledger: Ledger,
    pending_score: Option<PendingScore>,
    failure: Option<ProtocolError>,
}

impl Session {
    /// Single-device game: one key signs everything, the host seed alone
    /// opens the chain and the host plays fox first.
    pub fn local() -> Self {
        Self::local_with(KeyPair::generate(), SeedSecret::generate())
    }

    /// Local game from the given key and seed.
    pub fn local_with(keys: KeyPair, seed: SeedSecret) -> Self {
        let genesis = GenesisFrame {
            first_player: Party::Host,
            host: SeedReveal::new(seed.commitment(), seed.reveal()),
            peer: None,
        };
        let signature = sign_frame(&Frame::Genesis(genesis.clone()), &keys);
        let ledger = Ledger::open(genesis, vec![signature]);
        info!("Local game started, genesis {}", short(ledger.tip_hash()));

        Self {
            party: Party::Host,
            keys,
            peer_key: None,
            ledger,
            pending_score: None,
            failure: None,
        }
    }

    /// Two-party game from a completed handshake. The move counter starts at 0.
    pub fn from_handshake(outcome: HandshakeOutcome) -> Result<Self, ProtocolError> {
        let ledger = Ledger::new(outcome.genesis)?;
        info!(
            "Session ready as {}, {} plays fox first",
            outcome.party,
            ledger.round().starter
        );
        Ok(Self {
            party: outcome.party,
            keys: outcome.keys,
            peer_key: Some(outcome.peer_key),
            ledger,
            pending_score: None,
            failure: None,
        })
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    /// Our role in the connection (always host in local play).
    pub fn party(&self) -> Party {
        self.party
    }

    /// Single-device game.
    pub fn is_local(&self) -> bool {
        self.peer_key.is_none()
    }

    /// Our public key.
    pub fn public_key(&self) -> PublicKey {
        self.keys.public()
    }

    /// Peer's public key (two-party only).
    pub fn peer_key(&self) -> Option<&PublicKey> {
        self.peer_key.as_ref()
    }

    /// The chain so far.
    pub fn blocks(&self) -> &[Block] {
        self.ledger.blocks()
    }

    /// Chain and round state.
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Current board.
    pub fn board(&self) -> &Board {
        &self.ledger.round().board
    }

    /// Current round result.
    pub fn status(&self) -> GameStatus {
        self.ledger.status()
    }

    /// Party that moves next.
    pub fn turn_holder(&self) -> Party {
        self.ledger.turn_holder()
    }

    /// Can we move now?
    pub fn is_my_turn(&self) -> bool {
        !self.status().is_over() && (self.is_local() || self.turn_holder() == self.party)
    }

    /// Failure that aborted the session, if any.
    pub fn failure(&self) -> Option<&ProtocolError> {
        self.failure.as_ref()
    }

    /// Abort from outside (transport loss, timeout).
    pub fn abort(&mut self, error: ProtocolError) {
        if self.failure.is_none() {
            warn!("Session aborted: {}", error);
            self.failure = Some(error);
        }
    }

    fn ensure_alive(&self) -> Result<(), SessionError> {
        match self.failure {
            Some(_) => Err(SessionError::Aborted),
            None => Ok(()),
        }
    }

    /// Run `f`; a protocol error poisons the session.
    fn guarded<F>(&mut self, f: F) -> Result<Reaction, SessionError>
    where
        F: FnOnce(&mut Self) -> Result<Reaction, ProtocolError>,
    {
        self.ensure_alive()?;
        f(self).map_err(|e| {
            self.abort(e.clone());
            SessionError::Protocol(e)
        })
    }

    // -------------------------------------------------------------------------
    // Local actions
    // -------------------------------------------------------------------------

    /// Play `cell` for whoever holds the turn (us, in two-party play).
    pub fn play(&mut self, cell: u8) -> Result<Reaction, SessionError> {
        self.ensure_alive()?;
        if self.status().is_over() {
            return Err(SessionError::RoundOver);
        }
        if !self.is_local() && self.turn_holder() != self.party {
            return Err(SessionError::NotYourTurn);
        }
        self.board()
            .check_open(cell)
            .map_err(|_| SessionError::CellUnavailable(cell))?;

        self.guarded(|session| {
            let mut reaction = Reaction::default();
            let role = session.ledger.role_to_move();
            let party = session.ledger.turn_holder();
            let index = session.ledger.next_index();

            let (block, status) = session.ledger.record_local_move(cell, &session.keys)?;
            debug!("Played cell {} as {} ({})", cell, role, party);
            reaction.emit(SessionEvent::MovePlayed { index, party, role, cell });
            if !session.is_local() {
                reaction.send(PeerMessage::Move { block });
            }

            if status.is_over() {
                session.finish_round(&mut reaction)?;
            }
            Ok(reaction)
        })
    }

    /// Start the next round (host and local play only). The starter alternates.
    pub fn new_round(&mut self) -> Result<Reaction, SessionError> {
        self.ensure_alive()?;
        if self.party != Party::Host {
            return Err(SessionError::NotHost);
        }
        if !self.ledger.round().scored {
            return Err(SessionError::RoundInProgress);
        }

        self.guarded(|session| {
            let mut reaction = Reaction::default();
            let starter = session.ledger.round().starter.other();
            session.ledger.begin_round(starter)?;
            info!("Round started, {} plays fox", starter);

            if !session.is_local() {
                reaction.send(PeerMessage::NewRound { starter });
            }
            reaction.emit(SessionEvent::RoundStarted { starter });
            Ok(reaction)
        })
    }

    /// Ask for another round: a guest sends a request, the host just starts it.
    pub fn request_new_round(&mut self) -> Result<Reaction, SessionError> {
        if self.party == Party::Host {
            return self.new_round();
        }
        self.ensure_alive()?;
        if !self.ledger.round().scored {
            return Err(SessionError::RoundInProgress);
        }

        let mut reaction = Reaction::default();
        reaction.send(PeerMessage::RequestNewGame);
        Ok(reaction)
    }

    // -------------------------------------------------------------------------
    // Peer messages
    // -------------------------------------------------------------------------

    /// Handle one peer message.
    pub fn handle(&mut self, message: PeerMessage) -> Result<Reaction, SessionError> {
        self.guarded(|session| session.dispatch(message))
    }

    fn dispatch(&mut self, message: PeerMessage) -> Result<Reaction, ProtocolError> {
        let Some(peer_key) = self.peer_key else {
            return Err(ProtocolError::UnexpectedMessage {
                state: "playing a local game",
                got: message.type_name(),
            });
        };
        debug!("Session <- {}", message.type_name());

        match message {
            PeerMessage::Move { block } => self.on_move(block, &peer_key),
            PeerMessage::ScoreSig { signature } => self.on_score_sig(signature, &peer_key),
            PeerMessage::NewRound { starter } => self.on_new_round(starter),
            PeerMessage::RequestNewGame => Ok(self.on_new_game_request()),
            other => Err(ProtocolError::UnexpectedMessage {
                state: "playing",
                got: other.type_name(),
            }),
        }
    }

    fn on_move(&mut self, block: Block, peer_key: &PublicKey) -> Result<Reaction, ProtocolError> {
        let mut reaction = Reaction::default();
        let role = self.ledger.role_to_move();
        let index = self.ledger.next_index();

        self.ledger.validate_move(&block, peer_key)?;
        let (cell, party) = match &block.frame {
            Frame::Move(m) => (m.cell, m.player),
            other => {
                return Err(ProtocolError::WrongFrameType {
                    expected: FrameKind::Move,
                    got: other.kind(),
                })
            }
        };
        // Signed with the peer's key, so it can only be the peer's move.
        if party == self.party {
            return Err(ProtocolError::WrongTurn {
                expected: self.party,
                got: self.party.other(),
            });
        }

        let status = self.ledger.accept_remote_move(block, peer_key)?;
        reaction.emit(SessionEvent::MovePlayed { index, party, role, cell: cell as u8 });

        if status.is_over() {
            self.finish_round(&mut reaction)?;
        }
        Ok(reaction)
    }

    fn on_score_sig(&mut self, signature: String, peer_key: &PublicKey) -> Result<Reaction, ProtocolError> {
        if self.ledger.round().scored {
            return Err(ProtocolError::UnexpectedMessage {
                state: "the round is already scored",
                got: "score_sig",
            });
        }
        // The peer signs only after the final move, which reaches us first.
        if !self.status().is_over() {
            return Err(ProtocolError::UnexpectedMessage {
                state: "the round is still in progress",
                got: "score_sig",
            });
        }

        let mut reaction = Reaction::default();
        self.commit_score(signature, peer_key, &mut reaction)?;
        Ok(reaction)
    }

    fn on_new_round(&mut self, starter: Party) -> Result<Reaction, ProtocolError> {
        if self.party == Party::Host {
            return Err(ProtocolError::UnexpectedMessage {
                state: "hosting",
                got: "newround",
            });
        }
        if !self.ledger.round().scored {
            return Err(ProtocolError::UnexpectedMessage {
                state: "the current round is not scored yet",
                got: "newround",
            });
        }
        let expected = self.ledger.round().starter.other();
        if starter != expected {
            return Err(ProtocolError::WrongTurn {
                expected,
                got: starter,
            });
        }

        self.ledger.begin_round(starter)?;
        info!("Round started by host, {} plays fox", starter);

        let mut reaction = Reaction::default();
        reaction.emit(SessionEvent::RoundStarted { starter });
        Ok(reaction)
    }

    fn on_new_game_request(&mut self) -> Reaction {
        if self.party != Party::Host {
            debug!("Ignoring new game request sent to the guest");
            return Reaction::default();
        }
        if !self.ledger.round().scored {
            info!("Ignoring new game request: round not finished");
            return Reaction::default();
        }

        let mut reaction = Reaction::default();
        let starter = self.ledger.round().starter.other();
        if self.ledger.begin_round(starter).is_ok() {
            info!("Round started on guest request, {} plays fox", starter);
            reaction.send(PeerMessage::NewRound { starter });
            reaction.emit(SessionEvent::RoundStarted { starter });
        }
        reaction
    }

    // -------------------------------------------------------------------------
    // Scoring
    // -------------------------------------------------------------------------

    /// Sign the finished round's score; commit at once in local play,
    /// otherwise send our signature and commit when the peer's is in.
    fn finish_round(&mut self, reaction: &mut Reaction) -> Result<(), ProtocolError> {
        let Some(score) = self.ledger.pending_score() else {
            return Ok(());
        };
        let (starter, winner) = (score.starter, score.winner);
        info!("Round over: {} (fox was {})", winner, starter);
        reaction.emit(SessionEvent::RoundOver { starter, winner });

        let frame = Frame::Score(score);
        if self.is_local() {
            let block = Block::single(frame, &self.keys);
            return self.append_score(block, winner, reaction);
        }

        let signature = sign_frame(&frame, &self.keys);
        reaction.send(PeerMessage::ScoreSig {
            signature: signature.clone(),
        });
        self.pending_score = Some(PendingScore {
            frame,
            winner,
            signature,
        });
        Ok(())
    }

    fn commit_score(
        &mut self,
        peer_signature: String,
        peer_key: &PublicKey,
        reaction: &mut Reaction,
    ) -> Result<(), ProtocolError> {
        let Some(pending) = self.pending_score.take() else {
            return Err(ProtocolError::UnexpectedMessage {
                state: "no score is being signed",
                got: "score_sig",
            });
        };
        if !verify_frame(&pending.frame, &peer_signature, peer_key) {
            return Err(ProtocolError::SignatureInvalid {
                frame: FrameKind::Score,
            });
        }

        let block = Block::cosigned(pending.frame, self.party, pending.signature, peer_signature);
        self.append_score(block, pending.winner, reaction)
    }

    fn append_score(&mut self, block: Block, winner: Winner, reaction: &mut Reaction) -> Result<(), ProtocolError> {
        let hash = block.hash();
        self.ledger.commit_score(block)?;
        info!("Score committed: {} ({})", winner, short(&hash));
        reaction.emit(SessionEvent::ScoreCommitted { winner, hash });
        Ok(())
    }
}
