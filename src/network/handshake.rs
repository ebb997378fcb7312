//! Handshake Coordinator
//!
//! Fair-start exchange that produces the genesis block:
//!
//! ```text
//! Init ─start─▶ AwaitingPeerKey ─pubkey─▶ AwaitingPeerCommit ─commit─▶
//! AwaitingPeerReveal ─random─▶ CommitValidated ─sign─▶ AwaitingGenesisSig
//! ─genesis_sig─▶ Complete
//! ```
//!
//! Any wrong message, failed check or timeout moves to `Aborted`, which is
//! terminal. The state machine itself is synchronous; [`perform_handshake`]
//! drives it over a transport.

use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

use crate::chain::block::Block;
use crate::chain::frame::{sign_frame, verify_frame, Frame, FrameKind, SeedReveal};
use crate::core::hash::{is_hex_digest, short};
use crate::core::keys::{KeyPair, PublicKey};
use crate::core::party::Party;
use crate::core::rng::{derive_first_player, open_commitment, SeedSecret};
use crate::error::ProtocolError;
use crate::network::protocol::PeerMessage;
use crate::network::transport::Transport;

/// Handshake progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    /// Nothing sent yet.
    Init,
    /// Our key is out; waiting for theirs.
    AwaitingPeerKey,
    /// Our commitment is out; waiting for theirs.
    AwaitingPeerCommit,
    /// Our reveal is out; waiting for theirs.
    AwaitingPeerReveal,
    /// Peer reveal matched its commitment.
    CommitValidated,
    /// Our genesis signature is out; waiting for theirs.
    AwaitingGenesisSig,
    /// Genesis block assembled.
    Complete,
    /// Failed. Terminal.
    Aborted,
}

impl HandshakeState {
    /// Human-readable description for errors.
    pub fn describe(self) -> &'static str {
        match self {
            HandshakeState::Init => "starting the handshake",
            HandshakeState::AwaitingPeerKey => "waiting for the peer's public key",
            HandshakeState::AwaitingPeerCommit => "waiting for the peer's commitment",
            HandshakeState::AwaitingPeerReveal => "waiting for the peer's reveal",
            HandshakeState::CommitValidated => "signing the genesis frame",
            HandshakeState::AwaitingGenesisSig => "waiting for the peer's genesis signature",
            HandshakeState::Complete => "the handshake is complete",
            HandshakeState::Aborted => "the handshake has been aborted",
        }
    }
}

/// What the caller should do after feeding a message in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeStep {
    /// Send this to the peer and keep reading.
    Send(PeerMessage),
    /// Done; collect the result with [`Handshake::into_outcome`].
    Complete,
}

/// Everything a session needs once the handshake has succeeded.
#[derive(Debug)]
pub struct HandshakeOutcome {
    /// Our role in the connection.
    pub party: Party,
    /// Our signing keys.
    pub keys: KeyPair,
    /// Peer's verified public key.
    pub peer_key: PublicKey,
    /// Co-signed genesis block.
    pub genesis: Block,
}

/// One party's side of the handshake.
#[derive(Debug)]
pub struct Handshake {
    party: Party,
    state: HandshakeState,
    keys: KeyPair,
    seed: SeedSecret,
    peer_key: Option<PublicKey>,
    peer_commit: Option<String>,
    genesis: Option<Frame>,
    my_signature: Option<String>,
    block: Option<Block>,
}

impl Handshake {
    /// Fresh keys and seed from the OS random source.
    pub fn new(party: Party) -> Self {
        Self::with_parts(party, KeyPair::generate(), SeedSecret::generate())
    }

    /// Use the given keys and seed.
    pub fn with_parts(party: Party, keys: KeyPair, seed: SeedSecret) -> Self {
        Self {
            party,
            state: HandshakeState::Init,
            keys,
            seed,
            peer_key: None,
            peer_commit: None,
            genesis: None,
            my_signature: None,
            block: None,
        }
    }

    /// Current state.
    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// Our role.
    pub fn party(&self) -> Party {
        self.party
    }

    /// Move to `Aborted` (used by the driver on timeout).
    pub fn abort(&mut self) {
        self.state = HandshakeState::Aborted;
    }

    /// Leave `Init`: the first message is our public key.
    pub fn start(&mut self) -> Result<PeerMessage, ProtocolError> {
        if self.state != HandshakeState::Init {
            return Err(ProtocolError::UnexpectedMessage {
                state: self.state.describe(),
                got: "start",
            });
        }
        self.state = HandshakeState::AwaitingPeerKey;
        Ok(PeerMessage::PubKey {
            key: self.keys.export_public(),
        })
    }

    /// Feed one peer message. Any error aborts the handshake for good.
    pub fn handle(&mut self, message: PeerMessage) -> Result<HandshakeStep, ProtocolError> {
        let result = self.step(message);
        if let Err(ref e) = result {
            if self.state != HandshakeState::Aborted {
                warn!("Handshake aborted: {}", e);
            }
            self.state = HandshakeState::Aborted;
        }
        result
    }

    fn step(&mut self, message: PeerMessage) -> Result<HandshakeStep, ProtocolError> {
        debug!("Handshake {:?} <- {}", self.state, message.type_name());

        match (self.state, message) {
            (HandshakeState::AwaitingPeerKey, PeerMessage::PubKey { key }) => {
                self.peer_key = Some(PublicKey::import(&key)?);
                self.state = HandshakeState::AwaitingPeerCommit;
                Ok(HandshakeStep::Send(PeerMessage::Commit {
                    commit: self.seed.commitment(),
                }))
            }

            (HandshakeState::AwaitingPeerCommit, PeerMessage::Commit { commit }) => {
                if !is_hex_digest(&commit) {
                    return Err(ProtocolError::CommitMismatch);
                }
                // Equal seeds would always derive the host as first player.
                if commit.eq_ignore_ascii_case(&self.seed.commitment()) {
                    return Err(ProtocolError::MirroredCommit);
                }
                self.peer_commit = Some(commit);
                self.state = HandshakeState::AwaitingPeerReveal;
                Ok(HandshakeStep::Send(PeerMessage::Random {
                    random: self.seed.reveal(),
                }))
            }

            (HandshakeState::AwaitingPeerReveal, PeerMessage::Random { random }) => {
                let peer_commit = self.peer_commit.clone().unwrap_or_default();
                let peer_bytes =
                    open_commitment(&peer_commit, &random).ok_or(ProtocolError::CommitMismatch)?;
                self.state = HandshakeState::CommitValidated;

                let first_player = derive_first_player(self.seed.as_bytes(), &peer_bytes);
                let mine = SeedReveal::new(self.seed.commitment(), self.seed.reveal());
                let theirs = SeedReveal::new(peer_commit, random);
                let (host, guest) = match self.party {
                    Party::Host => (mine, theirs),
                    Party::Guest => (theirs, mine),
                };
                let frame = Frame::genesis(first_player, host, Some(guest));
                let signature = sign_frame(&frame, &self.keys);

                info!("Seeds verified, {} plays fox first", first_player);
                self.genesis = Some(frame);
                self.my_signature = Some(signature.clone());
                self.state = HandshakeState::AwaitingGenesisSig;
                Ok(HandshakeStep::Send(PeerMessage::GenesisSig { signature }))
            }

            (HandshakeState::AwaitingGenesisSig, PeerMessage::GenesisSig { signature }) => {
                let (Some(frame), Some(mine), Some(peer_key)) =
                    (self.genesis.take(), self.my_signature.take(), self.peer_key.as_ref())
                else {
                    return Err(ProtocolError::UnexpectedMessage {
                        state: self.state.describe(),
                        got: "genesis_sig",
                    });
                };
                if !verify_frame(&frame, &signature, peer_key) {
                    return Err(ProtocolError::SignatureInvalid {
                        frame: FrameKind::Genesis,
                    });
                }

                let block = Block::cosigned(frame, self.party, mine, signature);
                info!("Genesis block {} co-signed", short(&block.hash()));
                self.block = Some(block);
                self.state = HandshakeState::Complete;
                Ok(HandshakeStep::Complete)
            }

            (state, message) => Err(ProtocolError::UnexpectedMessage {
                state: state.describe(),
                got: message.type_name(),
            }),
        }
    }

    /// Result of a completed handshake.
    pub fn into_outcome(self) -> Result<HandshakeOutcome, ProtocolError> {
        match (self.state, self.peer_key, self.block) {
            (HandshakeState::Complete, Some(peer_key), Some(genesis)) => Ok(HandshakeOutcome {
                party: self.party,
                keys: self.keys,
                peer_key,
                genesis,
            }),
            (state, _, _) => Err(ProtocolError::UnexpectedMessage {
                state: state.describe(),
                got: "outcome request",
            }),
        }
    }
}

/// Run a fresh handshake over `transport`.
pub async fn perform_handshake<T: Transport>(
    transport: &mut T,
    party: Party,
    step_timeout: Duration,
) -> Result<HandshakeOutcome, ProtocolError> {
    drive_handshake(transport, Handshake::new(party), step_timeout).await
}

/// Drive a prepared handshake to completion. Each step waits at most
/// `step_timeout` for the peer.
#[instrument(skip_all, fields(party = %handshake.party()))]
pub async fn drive_handshake<T: Transport>(
    transport: &mut T,
    mut handshake: Handshake,
    step_timeout: Duration,
) -> Result<HandshakeOutcome, ProtocolError> {
    let hello = handshake.start()?;
    transport.send(&hello).await?;

    loop {
        let message = match timeout(step_timeout, transport.next_message()).await {
            Ok(received) => received?,
            Err(_) => {
                let waiting_for = handshake.state().describe();
                handshake.abort();
                warn!("Handshake timed out while {}", waiting_for);
                return Err(ProtocolError::Timeout(waiting_for));
            }
        };

        match handshake.handle(message)? {
            HandshakeStep::Send(reply) => transport.send(&reply).await?,
            HandshakeStep::Complete => return handshake.into_outcome(),
        }
    }
}
