//! Engine configuration
//!
//! Preset-based limits with range validation and versioned YAML loading.
//!
//! ```ignore
//! let config = EngineConfig::from_preset(Preset::Fast).with_notes(true);
//! config.validate()?;
//! let from_file = EngineConfig::from_yaml_file("smcheck.yaml")?;
//! ```

mod engine_config;
mod error;
mod io;
mod preset;

pub use engine_config::EngineConfig;
pub use error::{ConfigError, ConfigResult};
pub(crate) use error::find_closest_match;
pub use io::{ConfigFileV1, EngineOverrides};
pub use preset::Preset;
