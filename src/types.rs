// =============================================================================
// Shared types used across the signal scanner
// =============================================================================

use serde::{Deserialize, Serialize};

/// Trade direction of an emitted signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// `+1.0` for longs, `-1.0` for shorts.
    pub fn sign(self) -> f64 {
        match self {
            Self::Long => 1.0,
            Self::Short => -1.0,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Long => write!(f, "LONG"),
            Self::Short => write!(f, "SHORT"),
        }
    }
}

/// How SHORT take-profit targets are placed.
///
/// `Legacy` keeps the historical output where only TP1 was mirrored below
/// entry for shorts while TP2-TP4 stayed above it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TakeProfitMode {
    #[default]
    Mirrored,
    Legacy,
}

impl std::fmt::Display for TakeProfitMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mirrored => write!(f, "Mirrored"),
            Self::Legacy => write!(f, "Legacy"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_serialises_uppercase() {
        assert_eq!(serde_json::to_string(&Direction::Long).unwrap(), "\"LONG\"");
        let d: Direction = serde_json::from_str("\"SHORT\"").unwrap();
        assert_eq!(d, Direction::Short);
        assert_eq!(d.to_string(), "SHORT");
    }
}
