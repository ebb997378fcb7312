//! Kettu Peer
//!
//! Play fox-and-rabbit over a direct WebSocket link, on one terminal, or
//! watch a scripted two-party demo. The chain is printed as JSON lines on exit.

use anyhow::{bail, ensure, Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use kettu::{
    audit_chain,
    chain::AuditReport,
    core::hash::short,
    network::{connect_to_peer, listen_for_peer, run_session, ChannelTransport, Transport},
    Block, Board, Command, Party, PeerConfig, Role, Session, SessionEvent, VERSION,
};

/// Verifiable two-party tic-tac-toe
#[derive(Parser, Debug)]
#[command(name = "kettu-peer")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand, Debug)]
enum Mode {
    /// Wait for a guest to connect and play as host
    Host,
    /// Connect to a host and play as guest
    Join {
        /// Host address, e.g. ws://192.168.1.10:9080
        url: String,
    },
    /// Both players on this terminal
    Local,
    /// Scripted two-party game over an in-memory link
    Demo,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    let cli = Cli::parse();
    info!("Kettu Peer v{}", VERSION);
    let config = PeerConfig::from_env()?;

    match cli.mode {
        Mode::Host => {
            let transport = listen_for_peer(&config).await?;
            play_networked(transport, Party::Host, &config).await
        }
        Mode::Join { url } => {
            let transport = connect_to_peer(&url)
                .await
                .with_context(|| format!("could not reach {}", url))?;
            play_networked(transport, Party::Guest, &config).await
        }
        Mode::Local => play_local().await,
        Mode::Demo => demo(&config).await,
    }
}

// =============================================================================
// MODES
// =============================================================================

async fn play_networked<T: Transport>(transport: T, party: Party, config: &PeerConfig) -> Result<()> {
    let (command_tx, command_rx) = mpsc::channel(16);
    let (event_tx, mut event_rx) = mpsc::channel(64);

    let printer = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            println!("{}", describe(&event));
        }
    });
    spawn_stdin(command_tx);
    println!("You are the {}. Enter a cell 0-8, 'new' or 'quit'.", party);

    let result = run_session(transport, party, config, command_rx, event_tx).await;
    let _ = printer.await;
    let session = result?;

    print_chain(session.blocks())?;
    Ok(())
}

async fn play_local() -> Result<()> {
    let mut session = Session::local();
    let (command_tx, mut command_rx) = mpsc::channel(16);
    spawn_stdin(command_tx);

    println!("Local game. Fox moves first. Enter a cell 0-8, 'new' or 'quit'.");
    println!("{}", render_board(session.board()));

    while let Some(command) = command_rx.recv().await {
        let result = match command {
            Command::Play(cell) => session.play(cell),
            Command::NewRound => session.new_round(),
            Command::Quit => break,
        };
        match result {
            Ok(reaction) => {
                for event in &reaction.events {
                    println!("{}", describe(event));
                }
            }
            Err(e) => println!("{}", e),
        }
        println!("{}", render_board(session.board()));
    }

    let report = audit_chain(session.blocks(), &session.public_key(), None)?;
    print_report(&report);
    print_chain(session.blocks())?;
    Ok(())
}

/// Fox wins on the top row.
const DEMO_ROUND_ONE: [u8; 5] = [0, 3, 1, 4, 2];
/// Nobody gets three in a row.
const DEMO_ROUND_TWO: [u8; 9] = [4, 0, 2, 6, 3, 5, 7, 1, 8];

async fn demo(config: &PeerConfig) -> Result<()> {
    let (host_link, guest_link) = ChannelTransport::pair();
    let (host_cmd, host_rx) = mpsc::channel(16);
    let (guest_cmd, guest_rx) = mpsc::channel(16);
    let (host_tx, mut host_events) = mpsc::channel(64);
    let (guest_tx, mut guest_events) = mpsc::channel(64);

    let script = async move {
        let starter = match wait_for(&mut host_events, "host", |e| {
            matches!(e, SessionEvent::RoundStarted { .. })
        })
        .await?
        {
            SessionEvent::RoundStarted { starter } => starter,
            other => bail!("unexpected event {:?}", other),
        };
        wait_for(&mut guest_events, "guest", |e| matches!(e, SessionEvent::RoundStarted { .. })).await?;

        let mut script = Script {
            host_cmd: &host_cmd,
            guest_cmd: &guest_cmd,
            host_events: &mut host_events,
            guest_events: &mut guest_events,
            next_index: 0,
        };
        script.play_round(starter, &DEMO_ROUND_ONE).await?;

        host_cmd.send(Command::NewRound).await?;
        script.both(|e| matches!(e, SessionEvent::RoundStarted { .. })).await?;
        script.play_round(starter.other(), &DEMO_ROUND_TWO).await?;

        host_cmd.send(Command::Quit).await?;
        guest_cmd.send(Command::Quit).await?;
        Ok::<(), anyhow::Error>(())
    };

    let (host, guest, script) = tokio::join!(
        run_session(host_link, Party::Host, config, host_rx, host_tx),
        run_session(guest_link, Party::Guest, config, guest_rx, guest_tx),
        script,
    );
    script?;
    let (host, guest) = (host?, guest?);

    ensure!(host.blocks() == guest.blocks(), "host and guest chains diverged");
    let report = audit_chain(host.blocks(), &host.public_key(), Some(&guest.public_key()))?;
    print_report(&report);
    print_chain(host.blocks())?;
    Ok(())
}

// =============================================================================
// DEMO SCRIPT
// =============================================================================

struct Script<'a> {
    host_cmd: &'a mpsc::Sender<Command>,
    guest_cmd: &'a mpsc::Sender<Command>,
    host_events: &'a mut mpsc::Receiver<SessionEvent>,
    guest_events: &'a mut mpsc::Receiver<SessionEvent>,
    next_index: u64,
}

impl Script<'_> {
    /// Play `cells` alternately, fox (`starter`) first, until the score is in.
    async fn play_round(&mut self, starter: Party, cells: &[u8]) -> Result<()> {
        for (i, &cell) in cells.iter().enumerate() {
            let mover = if i % 2 == 0 { starter } else { starter.other() };
            let commands = match mover {
                Party::Host => self.host_cmd,
                Party::Guest => self.guest_cmd,
            };
            commands.send(Command::Play(cell)).await?;

            let index = self.next_index;
            self.both(|e| matches!(e, SessionEvent::MovePlayed { index: n, .. } if *n == index))
                .await?;
            self.next_index += 1;
        }
        self.both(|e| matches!(e, SessionEvent::ScoreCommitted { .. })).await
    }

    async fn both<F>(&mut self, pred: F) -> Result<()>
    where
        F: Fn(&SessionEvent) -> bool,
    {
        wait_for(self.host_events, "host", &pred).await?;
        wait_for(self.guest_events, "guest", &pred).await?;
        Ok(())
    }
}

/// Print events until one matches `pred`.
async fn wait_for<F>(
    events: &mut mpsc::Receiver<SessionEvent>,
    label: &str,
    pred: F,
) -> Result<SessionEvent>
where
    F: Fn(&SessionEvent) -> bool,
{
    loop {
        let Some(event) = events.recv().await else {
            bail!("{} session ended early", label);
        };
        println!("[{}] {}", label, describe(&event));
        if let SessionEvent::Aborted { reason } = &event {
            bail!("{} session aborted: {}", label, reason);
        }
        if pred(&event) {
            return Ok(event);
        }
    }
}

// =============================================================================
// TERMINAL I/O
// =============================================================================

/// Read commands from stdin on a plain thread; EOF drops the sender.
fn spawn_stdin(commands: mpsc::Sender<Command>) {
    std::thread::spawn(move || {
        for line in std::io::stdin().lines() {
            let Ok(line) = line else { break };
            let Some(command) = parse_command(&line) else {
                println!("Enter a cell 0-8, 'new' or 'quit'.");
                continue;
            };
            if commands.blocking_send(command).is_err() || command == Command::Quit {
                break;
            }
        }
    });
}

fn parse_command(line: &str) -> Option<Command> {
    match line.trim() {
        "new" => Some(Command::NewRound),
        "quit" | "q" => Some(Command::Quit),
        other => other.parse::<u8>().ok().map(Command::Play),
    }
}

fn describe(event: &SessionEvent) -> String {
    match event {
        SessionEvent::MovePlayed { index, party, role, cell } => {
            format!("#{} {} ({}) takes cell {}", index, party, role, cell)
        }
        SessionEvent::RoundOver { starter, winner } => {
            format!("Round over: {} (fox was {})", winner, starter)
        }
        SessionEvent::ScoreCommitted { winner, hash } => {
            format!("Score signed: {} [{}]", winner, short(hash))
        }
        SessionEvent::RoundStarted { starter } => format!("New round: {} plays fox", starter),
        SessionEvent::Rejected { reason } => format!("Not allowed: {}", reason),
        SessionEvent::Aborted { reason } => format!("Game aborted: {}", reason),
    }
}

fn render_board(board: &Board) -> String {
    let mut rows = Vec::with_capacity(3);
    for row in 0..3 {
        let cells: Vec<String> = (0..3)
            .map(|col| {
                let cell = (row * 3 + col) as u8;
                match board.get(cell) {
                    Some(Role::Fox) => "F".to_string(),
                    Some(Role::Rabbit) => "R".to_string(),
                    None => cell.to_string(),
                }
            })
            .collect();
        rows.push(cells.join(" "));
    }
    rows.join("\n")
}

fn print_report(report: &AuditReport) {
    info!(
        "Audit passed: {} blocks, {} moves, tip {}",
        report.blocks,
        report.moves,
        short(&report.tip)
    );
    for (i, round) in report.rounds.iter().enumerate() {
        let result = round
            .winner
            .map(|w| w.to_string())
            .unwrap_or_else(|| "unfinished".to_string());
        info!("Round {}: fox {}, {} moves, {}", i + 1, round.starter, round.moves, result);
    }
}

fn print_chain(blocks: &[Block]) -> Result<()> {
    for block in blocks {
        println!("{}", serde_json::to_string(block)?);
    }
    Ok(())
}
