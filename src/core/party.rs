//! Party indices.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One of the two parties in a session.
///
/// Index 0 is the host (the side that accepted the connection, or the only
/// side in local play); index 1 is the guest. Serialized as the bare integer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Party {
    /// Index 0.
    Host,
    /// Index 1.
    Guest,
}

impl Party {
    /// Numeric index used in frames.
    pub fn index(self) -> u8 {
        match self {
            Party::Host => 0,
            Party::Guest => 1,
        }
    }

    /// The other party.
    pub fn other(self) -> Party {
        match self {
            Party::Host => Party::Guest,
            Party::Guest => Party::Host,
        }
    }
}

impl From<Party> for u8 {
    fn from(party: Party) -> u8 {
        party.index()
    }
}

impl TryFrom<u8> for Party {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Party::Host),
            1 => Ok(Party::Guest),
            other => Err(format!("party index must be 0 or 1, got {}", other)),
        }
    }
}

impl fmt::Display for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Party::Host => write!(f, "host"),
            Party::Guest => write!(f, "guest"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialized_as_integer() {
        assert_eq!(serde_json::to_string(&Party::Guest).unwrap(), "1");
        assert_eq!(serde_json::from_str::<Party>("0").unwrap(), Party::Host);
        assert!(serde_json::from_str::<Party>("2").is_err());
    }

    #[test]
    fn test_other() {
        assert_eq!(Party::Host.other(), Party::Guest);
        assert_eq!(Party::Guest.other().other(), Party::Guest);
    }
}
