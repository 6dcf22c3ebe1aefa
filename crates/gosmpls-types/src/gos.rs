//! Guarantee of Service level carried in the EXP field.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Requested Guarantee of Service level.
///
/// Encoded in the 3-bit EXP field as `level + 4 * with_backup_lsp`, so
/// values 0-3 ask for levels 0-3 without a backup LSP and 4-7 ask for the
/// same levels with a backup LSP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct GosLevel {
    level: u8,
    backup_lsp: bool,
}

impl GosLevel {
    /// Highest GoS level.
    pub const MAX_LEVEL: u8 = 3;

    /// Best effort: level 0 with no backup LSP.
    pub const BEST_EFFORT: GosLevel = GosLevel {
        level: 0,
        backup_lsp: false,
    };

    /// Creates a GoS level.
    pub const fn new(level: u8, backup_lsp: bool) -> Result<Self, ParseError> {
        if level <= Self::MAX_LEVEL {
            Ok(GosLevel { level, backup_lsp })
        } else {
            Err(ParseError::InvalidGosLevel(level))
        }
    }

    /// Decodes an EXP field value.
    pub const fn from_exp(exp: u8) -> Result<Self, ParseError> {
        if exp > 7 {
            return Err(ParseError::InvalidGosLevel(exp));
        }
        Ok(GosLevel {
            level: exp & 0b11,
            backup_lsp: exp & 0b100 != 0,
        })
    }

    /// Encodes this level as an EXP field value.
    pub const fn exp(&self) -> u8 {
        self.level + if self.backup_lsp { 4 } else { 0 }
    }

    /// Returns the level (0-3).
    pub const fn level(&self) -> u8 {
        self.level
    }

    /// Returns true if a backup LSP is requested.
    pub const fn wants_backup_lsp(&self) -> bool {
        self.backup_lsp
    }
}

impl fmt::Display for GosLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.backup_lsp {
            write!(f, "GoS{}+backup", self.level)
        } else {
            write!(f, "GoS{}", self.level)
        }
    }
}

impl TryFrom<u8> for GosLevel {
    type Error = ParseError;

    fn try_from(exp: u8) -> Result<Self, Self::Error> {
        GosLevel::from_exp(exp)
    }
}

impl From<GosLevel> for u8 {
    fn from(level: GosLevel) -> u8 {
        level.exp()
    }
}
