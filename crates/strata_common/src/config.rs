//! World generation configuration handling

use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;

/// Settings of the world generator.
#[derive(Clone, Eq, PartialEq, Debug, SmartDefault, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldGenConfig {
    /// The world seed, every generated voxel is a pure function of it and the voxel position.
    #[default = 0]
    pub seed: u64,
    /// World height below which empty space above the terrain is filled with water.
    #[default = 0]
    pub sea_level: i32,
    /// Number of surface map fragments kept in memory.
    #[default = 64]
    pub map_cache_capacity: usize,
    /// Number of cave biome map fragments kept in memory.
    #[default = 16]
    pub cave_biome_cache_capacity: usize,
    /// Registry names of generator stages to leave out of the pipeline, like `strata:ore`.
    pub disabled_stages: Vec<String>,
    /// Whether the cave and crystal cavern stages run.
    #[default = true]
    pub generate_caves: bool,
    /// Whether the vegetation stage runs.
    #[default = true]
    pub generate_structures: bool,
}

impl WorldGenConfig {
    /// A default configuration with the given seed.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed,
            ..Default::default()
        }
    }

    /// Checks if the stage with the given registry name may run.
    pub fn is_stage_enabled(&self, name: &str) -> bool {
        !self.disabled_stages.iter().any(|s| s == name)
    }
}

/// All game configuration saved into the config file.
#[derive(Clone, Eq, PartialEq, Debug, SmartDefault, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// World generator configuration.
    pub world_gen: WorldGenConfig,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults() {
        let config = GameConfig::default().world_gen;
        assert_eq!(config.seed, 0);
        assert_eq!(config.map_cache_capacity, 64);
        assert_eq!(config.cave_biome_cache_capacity, 16);
        assert!(config.generate_caves && config.generate_structures);
        assert!(config.is_stage_enabled("strata:ore"));

        let config = WorldGenConfig {
            disabled_stages: vec!["strata:ore".to_owned()],
            ..WorldGenConfig::with_seed(9)
        };
        assert!(!config.is_stage_enabled("strata:ore"));
        assert!(config.is_stage_enabled("strata:terrain"));
    }
}
