//! Board and Win Rules
//!
//! A 3x3 board where fox and rabbit take turns; three in a row wins, a full
//! board without a line is a draw. Pure functions only: the ledger owns the
//! board for the current round and asks these rules for the result.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::party::Party;

/// Number of cells on the board.
pub const BOARD_SIZE: usize = 9;

/// Every winning line: rows, columns, diagonals.
pub const WIN_LINES: [[usize; 3]; 8] = [
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    [0, 4, 8],
    [2, 4, 6],
];

/// In-game identity for one round. Fox always moves first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Moves first.
    Fox,
    /// Moves second.
    Rabbit,
}

impl Role {
    /// The opposing role.
    pub fn other(self) -> Role {
        match self {
            Role::Fox => Role::Rabbit,
            Role::Rabbit => Role::Fox,
        }
    }

    /// Which party plays this role in a round started by `starter`.
    pub fn party(self, starter: Party) -> Party {
        match self {
            Role::Fox => starter,
            Role::Rabbit => starter.other(),
        }
    }

    /// Which role `party` plays in a round started by `starter`.
    pub fn of(party: Party, starter: Party) -> Role {
        if party == starter {
            Role::Fox
        } else {
            Role::Rabbit
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Fox => write!(f, "fox"),
            Role::Rabbit => write!(f, "rabbit"),
        }
    }
}

/// Final result recorded in a score frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Winner {
    /// Fox completed a line.
    Fox,
    /// Rabbit completed a line.
    Rabbit,
    /// Board filled without a line.
    Draw,
}

impl Winner {
    /// Wire name (`"fox"`, `"rabbit"`, `"draw"`).
    pub fn as_str(self) -> &'static str {
        match self {
            Winner::Fox => "fox",
            Winner::Rabbit => "rabbit",
            Winner::Draw => "draw",
        }
    }
}

impl From<Role> for Winner {
    fn from(role: Role) -> Self {
        match role {
            Role::Fox => Winner::Fox,
            Role::Rabbit => Winner::Rabbit,
        }
    }
}

impl fmt::Display for Winner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of evaluating a board.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GameStatus {
    /// No line and empty cells remain.
    InProgress,
    /// A role completed a line.
    Won(Role),
    /// Full board, no line.
    Draw,
}

impl GameStatus {
    /// Score-frame winner, if the round is over.
    pub fn winner(self) -> Option<Winner> {
        match self {
            GameStatus::InProgress => None,
            GameStatus::Won(role) => Some(role.into()),
            GameStatus::Draw => Some(Winner::Draw),
        }
    }

    /// Whether the round has ended.
    pub fn is_over(self) -> bool {
        !matches!(self, GameStatus::InProgress)
    }
}

/// Why a cell cannot be played.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum BoardError {
    /// Index outside 0..9.
    #[error("cell {0} is out of range")]
    OutOfRange(u8),

    /// Cell already taken.
    #[error("cell {0} is already occupied")]
    Occupied(u8),
}

/// Board for one round.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Board {
    cells: [Option<Role>; BOARD_SIZE],
}

impl Board {
    /// Empty board.
    pub fn new() -> Self {
        Self::default()
    }

    /// Occupant of a cell (`None` if empty or out of range).
    pub fn get(&self, cell: u8) -> Option<Role> {
        self.cells.get(cell as usize).copied().flatten()
    }

    /// Check that `cell` is in range and empty.
    pub fn check_open(&self, cell: u8) -> Result<(), BoardError> {
        match self.cells.get(cell as usize) {
            None => Err(BoardError::OutOfRange(cell)),
            Some(Some(_)) => Err(BoardError::Occupied(cell)),
            Some(None) => Ok(()),
        }
    }

    /// Place `role` on `cell`.
    pub fn place(&mut self, cell: u8, role: Role) -> Result<(), BoardError> {
        self.check_open(cell)?;
        self.cells[cell as usize] = Some(role);
        Ok(())
    }

    /// Number of occupied cells.
    pub fn filled(&self) -> usize {
        self.cells.iter().filter(|c| c.is_some()).count()
    }

    /// Role whose turn it is, by parity of occupied cells.
    pub fn to_move(&self) -> Role {
        if self.filled() % 2 == 0 {
            Role::Fox
        } else {
            Role::Rabbit
        }
    }

    /// Evaluate the board.
    pub fn status(&self) -> GameStatus {
        check_winner(self)
    }
}

/// Evaluate a board: winner, draw, or still in progress.
pub fn check_winner(board: &Board) -> GameStatus {
    for [a, b, c] in WIN_LINES {
        if let Some(role) = board.cells[a] {
            if board.cells[b] == Some(role) && board.cells[c] == Some(role) {
                return GameStatus::Won(role);
            }
        }
    }

    if board.filled() == BOARD_SIZE {
        GameStatus::Draw
    } else {
        GameStatus::InProgress
    }
}
