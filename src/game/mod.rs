//! Game rules (deterministic).
//!
//! The ledger delegates win/draw detection here; nothing in this module
//! knows about keys, hashes or the network.

pub mod board;

pub use board::{check_winner, Board, BoardError, GameStatus, Role, Winner, BOARD_SIZE, WIN_LINES};
