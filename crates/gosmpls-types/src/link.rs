//! Link kind definitions.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Whether a link joins two nodes of the MPLS domain or leaves it.
///
/// The combination of the incoming and outgoing link kinds decides the
/// label stack operation a label edge router applies to a flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkKind {
    /// Link between two nodes of the domain; carries labeled traffic and signaling.
    Internal,
    /// Link towards a node outside the domain; carries plain IPv4.
    External,
}

impl LinkKind {
    /// Returns true if this link stays inside the domain.
    pub const fn is_internal(&self) -> bool {
        matches!(self, LinkKind::Internal)
    }

    /// Returns true if this link leaves the domain.
    pub const fn is_external(&self) -> bool {
        matches!(self, LinkKind::External)
    }
}

impl fmt::Display for LinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LinkKind::Internal => "internal",
            LinkKind::External => "external",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for LinkKind {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "internal" | "int" => Ok(LinkKind::Internal),
            "external" | "ext" => Ok(LinkKind::External),
            _ => Err(ParseError::InvalidLinkKind(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_link_kind_parse() {
        assert_eq!("internal".parse::<LinkKind>().unwrap(), LinkKind::Internal);
        assert_eq!("EXT".parse::<LinkKind>().unwrap(), LinkKind::External);
        assert!("wireless".parse::<LinkKind>().is_err());
    }

    #[test]
    fn test_link_kind_predicates() {
        assert!(LinkKind::Internal.is_internal());
        assert!(LinkKind::External.is_external());
        assert!(!LinkKind::External.is_internal());
    }

    #[test]
    fn test_link_kind_display() {
        assert_eq!(LinkKind::Internal.to_string(), "internal");
        assert_eq!(LinkKind::External.to_string(), "external");
    }
}
