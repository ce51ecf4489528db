//! Strategy presets: canned risk profiles selectable by name.

use crate::strategy::StrategyConfig;
use rust_decimal_macros::dec;

/// Named risk profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyPreset {
    Conservative,
    Moderate,
    Aggressive,
    Experimental,
}

impl StrategyPreset {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Conservative => "conservative",
            Self::Moderate => "moderate",
            Self::Aggressive => "aggressive",
            Self::Experimental => "experimental",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "conservative" => Some(Self::Conservative),
            "moderate" => Some(Self::Moderate),
            "aggressive" => Some(Self::Aggressive),
            "experimental" => Some(Self::Experimental),
            _ => None,
        }
    }

    pub fn all() -> [Self; 4] {
        [
            Self::Conservative,
            Self::Moderate,
            Self::Aggressive,
            Self::Experimental,
        ]
    }

    /// The strategy tunables this preset stands for.
    pub fn strategy_config(&self) -> StrategyConfig {
        match self {
            Self::Conservative => StrategyConfig {
                base_bet: dec!(0.0005),
                max_losses: 5,
                multiplier: 2.0,
                ..StrategyConfig::default()
            },
            Self::Moderate => StrategyConfig {
                base_bet: dec!(0.001),
                max_losses: 8,
                multiplier: 2.0,
                ..StrategyConfig::default()
            },
            Self::Aggressive => StrategyConfig {
                base_bet: dec!(0.002),
                max_losses: 12,
                multiplier: 2.0,
                ..StrategyConfig::default()
            },
            Self::Experimental => StrategyConfig {
                base_bet: dec!(0.003),
                max_losses: 15,
                multiplier: 2.5,
                ..StrategyConfig::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_roundtrip() {
        for preset in StrategyPreset::all() {
            assert_eq!(StrategyPreset::parse(preset.as_str()), Some(preset));
        }
        assert_eq!(StrategyPreset::parse("reckless"), None);
    }

    #[test]
    fn test_preset_values() {
        let conservative = StrategyPreset::Conservative.strategy_config();
        assert_eq!(conservative.base_bet, dec!(0.0005));
        assert_eq!(conservative.max_losses, 5);

        let experimental = StrategyPreset::Experimental.strategy_config();
        assert_eq!(experimental.base_bet, dec!(0.003));
        assert_eq!(experimental.max_losses, 15);
        assert!((experimental.multiplier - 2.5).abs() < f64::EPSILON);
    }
}
