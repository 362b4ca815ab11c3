//! VSH Configuration System
//!
//! Provides unified YAML-based configuration for the shell.
//!
//! # Configuration Loading Priority
//!
//! 1. Compiled-in defaults
//! 2. `/etc/vsh/vsh.yaml` (system-wide)
//! 3. `~/.config/vsh/vsh.yaml` (user)
//! 4. `./vsh.yaml` (project-local)
//! 5. `VSH_CONFIG=/path/to/config.yaml` (explicit, highest priority)
//!
//! # Example Configuration
//!
//! ```yaml
//! shell:
//!   prompt: "{cwd} $ "
//!   history:
//!     file: "~/.vsh_history"
//!     max_entries: 1000
//!
//! logging:
//!   level: warn
//! ```

#![allow(missing_docs)]

mod error;
mod loader;
mod types;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use types::*;

/// Load configuration from default locations.
///
/// Searches for config files in priority order; the first one found wins.
/// The `VSH_CONFIG` environment variable overrides the search entirely.
pub fn load() -> Result<VshConfig, ConfigError> {
    ConfigLoader::new().load()
}

/// Load configuration from a specific file.
pub fn load_from_file(path: &str) -> Result<VshConfig, ConfigError> {
    ConfigLoader::new().with_file(path).load()
}
