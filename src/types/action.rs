//! Risk actions derived from fraud probabilities

use serde::{Deserialize, Serialize};
use std::fmt;

/// Human-facing action for a scored transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RiskAction {
    Block,
    Monitor,
    Safe,
}

impl RiskAction {
    pub const ALL: [RiskAction; 3] = [RiskAction::Block, RiskAction::Monitor, RiskAction::Safe];

    /// Map a fraud probability to an action.
    ///
    /// Both thresholds are exclusive: a probability equal to `block` is
    /// `Monitor`, and one equal to `monitor` is `Safe`.
    pub fn from_probability(probability: f64, thresholds: &ActionThresholds) -> Self {
        if probability > thresholds.block {
            RiskAction::Block
        } else if probability > thresholds.monitor {
            RiskAction::Monitor
        } else {
            RiskAction::Safe
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskAction::Block => "Block",
            RiskAction::Monitor => "Monitor",
            RiskAction::Safe => "Safe",
        }
    }
}

impl fmt::Display for RiskAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Probability cut-offs for risk actions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionThresholds {
    pub block: f64,
    pub monitor: f64,
}

impl ActionThresholds {
    /// Thresholds must satisfy `0 <= monitor <= block <= 1`.
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.monitor) || !(0.0..=1.0).contains(&self.block) {
            return Err(format!(
                "action thresholds must lie in [0, 1] (block={}, monitor={})",
                self.block, self.monitor
            ));
        }
        if self.monitor > self.block {
            return Err(format!(
                "monitor threshold {} exceeds block threshold {}",
                self.monitor, self.block
            ));
        }
        Ok(())
    }
}

impl Default for ActionThresholds {
    fn default() -> Self {
        Self {
            block: 0.85,
            monitor: 0.6,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_boundaries() {
        let t = ActionThresholds::default();

        assert_eq!(RiskAction::from_probability(0.85, &t), RiskAction::Monitor);
        assert_eq!(RiskAction::from_probability(0.850001, &t), RiskAction::Block);
        assert_eq!(RiskAction::from_probability(0.6, &t), RiskAction::Safe);
        assert_eq!(RiskAction::from_probability(0.600001, &t), RiskAction::Monitor);
        assert_eq!(RiskAction::from_probability(1.0, &t), RiskAction::Block);
        assert_eq!(RiskAction::from_probability(0.0, &t), RiskAction::Safe);
    }

    #[test]
    fn test_action_display() {
        assert_eq!(RiskAction::Block.to_string(), "Block");
        assert_eq!(RiskAction::Monitor.to_string(), "Monitor");
        assert_eq!(RiskAction::Safe.to_string(), "Safe");
    }

    #[test]
    fn test_threshold_validation() {
        assert!(ActionThresholds::default().validate().is_ok());

        let inverted = ActionThresholds {
            block: 0.5,
            monitor: 0.7,
        };
        assert!(inverted.validate().is_err());

        let out_of_range = ActionThresholds {
            block: 1.5,
            monitor: 0.6,
        };
        assert!(out_of_range.validate().is_err());
    }

    #[test]
    fn test_action_serialization() {
        let json = serde_json::to_string(&RiskAction::Monitor).unwrap();
        assert_eq!(json, "\"Monitor\"");
    }
}
