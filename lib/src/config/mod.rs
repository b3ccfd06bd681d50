use std::path::Path;

use figment::{
    providers::{Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::mode::MatchMode;
use crate::patterns::DEFAULT_GROWTH_BITS;

/// Configuration for pattern matching and file type recognition.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// How file contents are obtained.
    pub content: ContentConfig,
    /// Random self-checks of patterns.
    pub self_check: SelfCheckConfig,
}

/// How file contents are obtained.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ContentConfig {
    /// Map the matched window of the file into memory instead of reading
    /// it.
    pub use_mmap: bool,
    /// Read the window when it can't be mapped, instead of failing.
    pub read_fallback: bool,
    /// How content patterns of file types are matched.
    pub mode: MatchMode,
}

/// Random self-checks of patterns.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct SelfCheckConfig {
    /// Number of random instances checked for each pattern.
    pub instances: usize,
    /// Number of bits that unbounded repetitions can grow while generating
    /// random instances.
    pub growth_bits: u64,
    /// Seed of the random number generator.
    pub seed: u64,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            content: ContentConfig {
                use_mmap: true,
                read_fallback: true,
                mode: MatchMode::Partial,
            },
            self_check: SelfCheckConfig {
                instances: 16,
                growth_bits: DEFAULT_GROWTH_BITS,
                seed: 0,
            },
        }
    }
}

/// Load config file from a given path. Path must contain a valid TOML file or
/// this function will propagate the error. Settings missing from the file
/// keep their default values.
pub fn load_config_from_file(
    config_file: &Path,
) -> Result<Config, figment::Error> {
    let config: Config =
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file_exact(config_file))
            .extract()?;
    Ok(config)
}
