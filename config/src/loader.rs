use crate::{ConfigError, VshConfig};
use std::path::PathBuf;

pub struct ConfigLoader {
    explicit_file: Option<PathBuf>,
    search_paths: Vec<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        let mut search_paths = Vec::new();

        search_paths.push(PathBuf::from("./vsh.yaml"));
        if let Some(home) = dirs::home_dir() {
            search_paths.push(home.join(".config/vsh/vsh.yaml"));
        }

        #[cfg(unix)]
        search_paths.push(PathBuf::from("/etc/vsh/vsh.yaml"));

        Self {
            explicit_file: None,
            search_paths,
        }
    }

    pub fn with_file(mut self, path: &str) -> Self {
        self.explicit_file = Some(PathBuf::from(path));
        self
    }

    /// Load the configuration. `VSH_CONFIG` wins over an explicit file,
    /// which wins over the search paths (most specific path first);
    /// with no file found anywhere, compiled-in defaults are returned.
    pub fn load(&self) -> Result<VshConfig, ConfigError> {
        if let Ok(env_path) = std::env::var("VSH_CONFIG") {
            return Self::read(PathBuf::from(env_path));
        }

        if let Some(ref explicit) = self.explicit_file {
            return Self::read(explicit.clone());
        }

        for path in &self.search_paths {
            if path.exists() {
                tracing::debug!(path = %path.display(), "loading config");
                return Self::read(path.clone());
            }
        }

        Ok(VshConfig::default())
    }

    fn read(path: PathBuf) -> Result<VshConfig, ConfigError> {
        let content = std::fs::read_to_string(&path)
            .map_err(|e| ConfigError::ReadFile { path, source: e })?;
        Ok(serde_yaml::from_str(&content)?)
    }
}
