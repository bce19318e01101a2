// Configuration module for reading Arena.toml
// Every tunable constant of the arena lives here so balance changes never
// touch engine code.

use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::types::PowerUpKind;

/// Main configuration structure containing all tunable parameters
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub timing: TimingConfig,
    pub rules: RulesConfig,
    pub bots: BotsConfig,
    pub drops: Vec<DropWeight>,
    pub debug: DebugConfig,
}

/// Durations of every scheduled action, in milliseconds
#[derive(Debug, Deserialize, Clone)]
pub struct TimingConfig {
    pub fuse_ms: u64,
    pub slide_step_ms: u64,
    pub round_duration_ms: u64,
    pub sudden_death_interval_ms: u64,
    pub round_end_delay_ms: u64,
    pub next_round_delay_ms: u64,
    pub bot_think_interval_ms: u64,
}

/// Game rules and balance constants
#[derive(Debug, Deserialize, Clone)]
pub struct RulesConfig {
    pub max_players: usize,
    pub wins_to_match: u32,
    pub soft_wall_chance: f64,
    pub power_up_chance: f64,
    pub starting_bomb_power: u32,
    pub starting_max_bombs: u32,
    pub super_bomb_power: u32,
    pub sudden_death_bomb_power: u32,
    pub sudden_death_max_bombs: u32,
    pub max_chain_depth: usize,
}

/// Bot behaviour constants
#[derive(Debug, Deserialize, Clone)]
pub struct BotsConfig {
    pub wander_chance: f64,
}

/// One entry of the power-up drop table
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct DropWeight {
    pub kind: PowerUpKind,
    pub weight: f64,
}

/// Match log configuration
#[derive(Debug, Deserialize, Clone)]
pub struct DebugConfig {
    pub enabled: bool,
    pub log_file_path: String,
}

impl Config {
    /// Loads configuration from a TOML file
    ///
    /// # Arguments
    /// * `path` - Path to the Arena.toml configuration file
    ///
    /// # Returns
    /// * `Result<Config, String>` - Parsed configuration or error message
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let contents = fs::read_to_string(path.as_ref())
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        let config: Config = toml::from_str(&contents)
            .map_err(|e| format!("Failed to parse config file: {}", e))?;

        config.validate()?;
        Ok(config)
    }

    /// Loads default configuration from Arena.toml in the project root
    pub fn load_default() -> Result<Self, String> {
        Self::from_file("Arena.toml")
    }

    /// Rejects tables the engine cannot sample from
    fn validate(&self) -> Result<(), String> {
        if self.drops.is_empty() {
            return Err("Drop table must contain at least one entry".to_string());
        }
        if let Some(bad) = self.drops.iter().find(|d| !(d.weight > 0.0)) {
            return Err(format!(
                "Drop weight for {:?} must be positive, got {}",
                bad.kind, bad.weight
            ));
        }
        if self.rules.max_players == 0 || self.rules.max_players > crate::map::SPAWN_POINTS.len() {
            return Err(format!(
                "max_players must be between 1 and {}",
                crate::map::SPAWN_POINTS.len()
            ));
        }
        Ok(())
    }

    /// Creates a configuration with hardcoded default values as fallback
    /// This should match the constants defined in Arena.toml
    pub fn default_hardcoded() -> Self {
        Config {
            timing: TimingConfig {
                fuse_ms: 3000,
                slide_step_ms: 100,
                round_duration_ms: 120_000,
                sudden_death_interval_ms: 1000,
                round_end_delay_ms: 1500,
                next_round_delay_ms: 5000,
                bot_think_interval_ms: 500,
            },
            rules: RulesConfig {
                max_players: 5,
                wins_to_match: 5,
                soft_wall_chance: 0.75,
                power_up_chance: 0.40,
                starting_bomb_power: 1,
                starting_max_bombs: 1,
                super_bomb_power: 6,
                sudden_death_bomb_power: 5,
                sudden_death_max_bombs: 5,
                max_chain_depth: 64,
            },
            bots: BotsConfig { wander_chance: 0.70 },
            drops: vec![
                DropWeight { kind: PowerUpKind::BombUp, weight: 0.25 },
                DropWeight { kind: PowerUpKind::FireUp, weight: 0.25 },
                DropWeight { kind: PowerUpKind::KickBomb, weight: 0.15 },
                DropWeight { kind: PowerUpKind::SuperBomb, weight: 0.10 },
                DropWeight { kind: PowerUpKind::Skull, weight: 0.10 },
                DropWeight { kind: PowerUpKind::WallPass, weight: 0.08 },
                DropWeight { kind: PowerUpKind::BombPass, weight: 0.07 },
            ],
            debug: DebugConfig {
                enabled: false,
                log_file_path: "arena_matches.jsonl".to_string(),
            },
        }
    }

    /// Attempts to load from file, falls back to hardcoded defaults on error
    pub fn load_or_default() -> Self {
        Self::load_default().unwrap_or_else(|e| {
            log::warn!("Could not load Arena.toml ({}), using hardcoded defaults", e);
            Self::default_hardcoded()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_can_be_created() {
        let config = Config::default_hardcoded();
        assert_eq!(config.timing.fuse_ms, 3000);
        assert_eq!(config.rules.wins_to_match, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_drop_weights_sum_to_one() {
        let config = Config::default_hardcoded();
        let total: f64 = config.drops.iter().map(|d| d.weight).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_arena_toml_can_be_parsed() {
        let result = Config::from_file("Arena.toml");
        assert!(
            result.is_ok(),
            "Failed to parse Arena.toml: {:?}",
            result.err()
        );
    }

    #[test]
    fn test_all_config_values_match_hardcoded_defaults() {
        let file_config = Config::from_file("Arena.toml").expect("Arena.toml should be parseable");
        let hardcoded = Config::default_hardcoded();

        assert_eq!(file_config.timing.fuse_ms, hardcoded.timing.fuse_ms);
        assert_eq!(file_config.timing.slide_step_ms, hardcoded.timing.slide_step_ms);
        assert_eq!(file_config.timing.round_duration_ms, hardcoded.timing.round_duration_ms);
        assert_eq!(
            file_config.timing.sudden_death_interval_ms,
            hardcoded.timing.sudden_death_interval_ms
        );
        assert_eq!(file_config.timing.round_end_delay_ms, hardcoded.timing.round_end_delay_ms);
        assert_eq!(file_config.timing.next_round_delay_ms, hardcoded.timing.next_round_delay_ms);
        assert_eq!(
            file_config.timing.bot_think_interval_ms,
            hardcoded.timing.bot_think_interval_ms
        );

        assert_eq!(file_config.rules.max_players, hardcoded.rules.max_players);
        assert_eq!(file_config.rules.wins_to_match, hardcoded.rules.wins_to_match);
        assert_eq!(file_config.rules.super_bomb_power, hardcoded.rules.super_bomb_power);
        assert_eq!(
            file_config.rules.sudden_death_bomb_power,
            hardcoded.rules.sudden_death_bomb_power
        );
        assert_eq!(
            file_config.rules.sudden_death_max_bombs,
            hardcoded.rules.sudden_death_max_bombs
        );
        assert_eq!(file_config.bots.wander_chance, hardcoded.bots.wander_chance);
        assert_eq!(file_config.drops, hardcoded.drops);
    }

    #[test]
    fn test_empty_drop_table_is_rejected() {
        let mut config = Config::default_hardcoded();
        config.drops.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_non_positive_weight_is_rejected() {
        let mut config = Config::default_hardcoded();
        config.drops[2].weight = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let result = Config::from_file("nonexistent.toml");
        assert!(result.is_err());
    }
}
