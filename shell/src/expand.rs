//! Expansion collaborators: variables, glob patterns, home paths
//!
//! The parser and the execution engine consume these services through the
//! [`Expander`] trait so tests can substitute deterministic
//! implementations. [`Env`] is the process-backed default.

use std::collections::HashMap;

/// The expansion services the core consumes.
pub trait Expander {
    /// Resolve `$NAME`. `None` means the variable is unset.
    fn expand_variable(&self, name: &str) -> Option<String>;

    /// Bind `NAME=value`.
    fn assign_variable(&mut self, name: &str, value: &str);

    /// Expand a glob pattern. An empty result means "no match, keep the
    /// literal pattern".
    fn expand_glob(&self, pattern: &str) -> Vec<String>;

    /// Expand a leading `~` against the home directory.
    fn expand_home(&self, path: &str) -> String;
}

/// Process-backed variable store and expansion services.
///
/// Shell-local assignments shadow the process environment; lookups fall
/// back to `std::env` so inherited variables like `HOME` resolve without
/// explicit import.
#[derive(Debug, Default)]
pub struct Env {
    vars: HashMap<String, String>,
}

impl Env {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }
}

impl Expander for Env {
    fn expand_variable(&self, name: &str) -> Option<String> {
        self.vars
            .get(name)
            .cloned()
            .or_else(|| std::env::var(name).ok())
    }

    fn assign_variable(&mut self, name: &str, value: &str) {
        self.vars.insert(name.to_string(), value.to_string());
    }

    fn expand_glob(&self, pattern: &str) -> Vec<String> {
        let Ok(paths) = glob::glob(pattern) else {
            return Vec::new();
        };
        let mut matches: Vec<String> = paths
            .filter_map(Result::ok)
            .map(|p| p.to_string_lossy().into_owned())
            .collect();
        matches.sort();
        matches
    }

    fn expand_home(&self, path: &str) -> String {
        let home = self
            .expand_variable("HOME")
            .map(std::path::PathBuf::from)
            .or_else(dirs::home_dir);
        let Some(home) = home else {
            return path.to_string();
        };

        if path == "~" {
            home.to_string_lossy().into_owned()
        } else if let Some(rest) = path.strip_prefix("~/") {
            home.join(rest).to_string_lossy().into_owned()
        } else {
            path.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assignment_shadows_process_env() {
        let mut env = Env::new();
        env.assign_variable("PATH", "/custom");
        assert_eq!(env.expand_variable("PATH").as_deref(), Some("/custom"));
    }

    #[test]
    fn unset_variable_is_none() {
        let env = Env::new();
        assert_eq!(env.expand_variable("VSH_DEFINITELY_UNSET_VAR"), None);
    }

    #[test]
    fn home_expansion() {
        let mut env = Env::new();
        env.assign_variable("HOME", "/home/tester");
        assert_eq!(env.expand_home("~"), "/home/tester");
        assert_eq!(env.expand_home("~/src"), "/home/tester/src");
        assert_eq!(env.expand_home("/etc"), "/etc");
        // ~user expansion is not supported; the literal survives
        assert_eq!(env.expand_home("~other"), "~other");
    }

    #[test]
    fn unmatched_glob_is_empty() {
        let env = Env::new();
        assert!(env
            .expand_glob("/nonexistent_vsh_dir_xyz/*.none")
            .is_empty());
    }
}
