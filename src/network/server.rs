//! Peer Connection & Session Driver
//!
//! Establishes the single peer connection (host listens, guest dials) and
//! drives a [`Session`] over any [`Transport`]: handshake first, then a loop
//! over local commands and peer messages.

use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::{accept_async, connect_async, MaybeTlsStream};
use tracing::{debug, info, instrument, warn};

use crate::config::PeerConfig;
use crate::core::party::Party;
use crate::error::ProtocolError;
use crate::network::handshake::perform_handshake;
use crate::network::protocol::PeerMessage;
use crate::network::session::{Reaction, Session, SessionError, SessionEvent};
use crate::network::transport::{Transport, TransportError, WsTransport};

/// What the local player asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Play a cell (0-8).
    Play(u8),
    /// Start (host) or request (guest) the next round.
    NewRound,
    /// Leave the session.
    Quit,
}

// =============================================================================
// CONNECTION
// =============================================================================

/// Bind `config.bind_addr` and wait for one guest.
#[instrument(skip(config), fields(addr = %config.bind_addr))]
pub async fn listen_for_peer(config: &PeerConfig) -> Result<WsTransport<TcpStream>, TransportError> {
    let listener = TcpListener::bind(config.bind_addr).await?;
    info!("Waiting up to {}s for a peer", config.connect_window.as_secs());
    accept_peer(listener, config.connect_window).await
}

/// Accept exactly one connection on `listener` and complete its WebSocket
/// upgrade, all within `window`.
///
/// The listener is dropped once a peer is in, so later connection attempts
/// are refused by the OS. A peer that connects but never upgrades uses up
/// the same window.
pub async fn accept_peer(
    listener: TcpListener,
    window: Duration,
) -> Result<WsTransport<TcpStream>, TransportError> {
    let accepted = timeout(window, async move {
        let (stream, addr) = listener.accept().await?;
        drop(listener);
        info!("Peer connected from {}", addr);
        let ws = accept_async(stream).await?;
        Ok::<_, TransportError>(ws)
    })
    .await;

    match accepted {
        Ok(ws) => Ok(WsTransport::new(ws?)),
        Err(_) => {
            warn!("No peer completed a connection within {}s", window.as_secs());
            Err(TransportError::ConnectWindowElapsed(window.as_secs()))
        }
    }
}

/// Dial the host's WebSocket.
#[instrument]
pub async fn connect_to_peer(
    url: &str,
) -> Result<WsTransport<MaybeTlsStream<TcpStream>>, TransportError> {
    let (ws, _response) = connect_async(url).await?;
    info!("Connected to host");
    Ok(WsTransport::new(ws))
}

// =============================================================================
// DRIVER
// =============================================================================

enum Input {
    Command(Option<Command>),
    Peer(Result<PeerMessage, ProtocolError>),
}

/// Run a two-party session to the end.
///
/// Returns the session when the player quits (or drops the command channel).
/// Any protocol failure is reported once as [`SessionEvent::Aborted`], the
/// transport is closed and the error returned.
#[instrument(skip_all, fields(party = %party))]
pub async fn run_session<T: Transport>(
    mut transport: T,
    party: Party,
    config: &PeerConfig,
    mut commands: mpsc::Receiver<Command>,
    events: mpsc::Sender<SessionEvent>,
) -> Result<Session, ProtocolError> {
    let outcome = match perform_handshake(&mut transport, party, config.step_timeout).await {
        Ok(outcome) => outcome,
        Err(e) => return Err(fail(&mut transport, &events, e).await),
    };
    let mut session = match Session::from_handshake(outcome) {
        Ok(session) => session,
        Err(e) => return Err(fail(&mut transport, &events, e).await),
    };
    let _ = events
        .send(SessionEvent::RoundStarted {
            starter: session.turn_holder(),
        })
        .await;

    loop {
        // Local commands first, so a queued quit wins over a peer message.
        let input = tokio::select! {
            biased;
            command = commands.recv() => Input::Command(command),
            message = transport.next_message() => Input::Peer(message),
        };

        let result = match input {
            Input::Command(Some(Command::Play(cell))) => session.play(cell),
            Input::Command(Some(Command::NewRound)) => session.request_new_round(),
            Input::Command(Some(Command::Quit)) | Input::Command(None) => {
                info!("Leaving session with {} blocks", session.blocks().len());
                transport.close().await;
                return Ok(session);
            }
            Input::Peer(Ok(message)) => session.handle(message),
            Input::Peer(Err(e)) => {
                session.abort(e.clone());
                Err(SessionError::Protocol(e))
            }
        };

        match result {
            Ok(reaction) => {
                if let Err(e) = dispatch(&mut transport, &events, reaction).await {
                    session.abort(e.clone());
                    return Err(fail(&mut transport, &events, e).await);
                }
            }
            Err(SessionError::Protocol(e)) => return Err(fail(&mut transport, &events, e).await),
            Err(other) => {
                debug!("Command refused: {}", other);
                let _ = events
                    .send(SessionEvent::Rejected {
                        reason: other.to_string(),
                    })
                    .await;
            }
        }
    }
}

/// Send a reaction's messages, then publish its events.
async fn dispatch<T: Transport>(
    transport: &mut T,
    events: &mpsc::Sender<SessionEvent>,
    reaction: Reaction,
) -> Result<(), ProtocolError> {
    for message in &reaction.outgoing {
        debug!("Session -> {}", message.type_name());
        transport.send(message).await?;
    }
    for event in reaction.events {
        let _ = events.send(event).await;
    }
    Ok(())
}

/// Report a fatal error once and close the transport.
async fn fail<T: Transport>(
    transport: &mut T,
    events: &mpsc::Sender<SessionEvent>,
    error: ProtocolError,
) -> ProtocolError {
    warn!("Session failed: {}", error);
    let _ = events
        .send(SessionEvent::Aborted {
            reason: error.to_string(),
        })
        .await;
    transport.close().await;
    error
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::transport::ChannelTransport;

    fn quick_config() -> PeerConfig {
        PeerConfig {
            step_timeout: Duration::from_millis(200),
            ..PeerConfig::default()
        }
    }

    #[tokio::test]
    async fn test_accept_window_elapses() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let result = accept_peer(listener, Duration::from_millis(20)).await;
        assert!(matches!(result, Err(TransportError::ConnectWindowElapsed(0))));
    }

    #[tokio::test]
    async fn test_silent_socket_uses_up_window() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        // Connects at the TCP level but never sends the upgrade request.
        let _silent = TcpStream::connect(addr).await.unwrap();

        let result = timeout(
            Duration::from_secs(2),
            accept_peer(listener, Duration::from_millis(100)),
        )
        .await
        .expect("connect window not enforced");
        assert!(matches!(result, Err(TransportError::ConnectWindowElapsed(0))));

        // The listener is gone: nobody else gets in.
        assert!(TcpStream::connect(addr).await.is_err());
    }

    #[tokio::test]
    async fn test_websocket_handshake_and_quit() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        let config = quick_config();

        let (host_cmd, host_rx) = mpsc::channel(8);
        let (guest_cmd, guest_rx) = mpsc::channel(8);
        let (host_events, mut host_events_rx) = mpsc::channel(32);
        let (guest_events, mut guest_events_rx) = mpsc::channel(32);

        let host = async {
            let transport = accept_peer(listener, Duration::from_secs(5)).await.unwrap();
            run_session(transport, Party::Host, &config, host_rx, host_events).await
        };
        let guest = async {
            let transport = connect_to_peer(&url).await.unwrap();
            run_session(transport, Party::Guest, &config, guest_rx, guest_events).await
        };
        let script = async {
            let first = host_events_rx.recv().await.unwrap();
            let second = guest_events_rx.recv().await.unwrap();
            assert_eq!(first, second);

            // Guest leaves; its event channel closes when its driver returns.
            guest_cmd.send(Command::Quit).await.unwrap();
            while guest_events_rx.recv().await.is_some() {}

            // Host sees the disconnect as fatal.
            assert!(matches!(
                host_events_rx.recv().await,
                Some(SessionEvent::Aborted { .. })
            ));
            drop(host_cmd);
        };

        let (host, guest, ()) = tokio::join!(host, guest, script);
        assert_eq!(host.unwrap_err(), ProtocolError::Disconnected);
        let guest = guest.unwrap();
        assert_eq!(guest.blocks().len(), 1);
        assert!(guest.blocks()[0].signatures.len() == 2);
    }

    #[tokio::test]
    async fn test_silent_peer_times_out() {
        let (a, _b) = ChannelTransport::pair();
        let (_cmd, rx) = mpsc::channel(1);
        let (events, mut events_rx) = mpsc::channel(4);

        let result = run_session(a, Party::Host, &quick_config(), rx, events).await;
        assert!(matches!(result, Err(ProtocolError::Timeout(_))));
        assert!(matches!(
            events_rx.recv().await,
            Some(SessionEvent::Aborted { .. })
        ));
    }

    #[tokio::test]
    async fn test_refused_command_is_not_fatal() {
        let (a, b) = ChannelTransport::pair();
        let config = quick_config();
        let (host_cmd, host_rx) = mpsc::channel(8);
        let (guest_cmd, guest_rx) = mpsc::channel(8);
        let (host_events, mut host_events_rx) = mpsc::channel(32);
        let (guest_events, _guest_events_rx) = mpsc::channel(32);

        let script = async {
            let _ = host_events_rx.recv().await;
            host_cmd.send(Command::Play(42)).await.unwrap();
            assert!(matches!(
                host_events_rx.recv().await,
                Some(SessionEvent::Rejected { .. })
            ));
            host_cmd.send(Command::Quit).await.unwrap();
            guest_cmd.send(Command::Quit).await.unwrap();
        };

        // The guest may see the host's departure as a disconnect; only the
        // host's outcome matters here.
        let (host, _guest, ()) = tokio::join!(
            run_session(a, Party::Host, &config, host_rx, host_events),
            run_session(b, Party::Guest, &config, guest_rx, guest_events),
            script,
        );
        assert!(host.unwrap().failure().is_none());
    }
}
