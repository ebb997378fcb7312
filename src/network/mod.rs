//! Network Layer
//!
//! Peer connection, handshake and the live session.
//! Everything here is driven by peer input; the rules live in `chain/` and `game/`.

pub mod handshake;
pub mod protocol;
pub mod server;
pub mod session;
pub mod transport;

pub use handshake::{
    drive_handshake, perform_handshake, Handshake, HandshakeOutcome, HandshakeState, HandshakeStep,
};
pub use protocol::PeerMessage;
pub use server::{accept_peer, connect_to_peer, listen_for_peer, run_session, Command};
pub use session::{Reaction, Session, SessionError, SessionEvent};
pub use transport::{ChannelTransport, Transport, TransportError, WsTransport};
