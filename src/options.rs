//! Ambient configuration: where repos live, and the HTTP binary's listen
//! port. Sourced from environment variables with documented fallbacks;
//! core semantics never depend on these values being set.

use std::path::PathBuf;

const DEFAULT_REPO_BASE: &str = "./repos";
const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Clone)]
pub struct Config {
    /// `GITSTORE_REPO_BASE`: directory holding all per-repo trees.
    pub repo_base: PathBuf,
    /// `PORT`: listen port for the HTTP binary.
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            repo_base: PathBuf::from(DEFAULT_REPO_BASE),
            port: DEFAULT_PORT,
        }
    }
}

impl Config {
    /// Build from the environment, falling back to documented defaults for
    /// anything unset or unparsable.
    pub fn from_env() -> Self {
        let repo_base = std::env::var("GITSTORE_REPO_BASE")
            .or_else(|_| std::env::var("GITSTORE_DB_PATH"))
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_REPO_BASE));

        let port = std::env::var("PORT")
            .ok()
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(DEFAULT_PORT);

        Config { repo_base, port }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_env_is_unset() {
        std::env::remove_var("GITSTORE_REPO_BASE");
        std::env::remove_var("GITSTORE_DB_PATH");
        std::env::remove_var("PORT");
        let config = Config::from_env();
        assert_eq!(config.repo_base, PathBuf::from(DEFAULT_REPO_BASE));
        assert_eq!(config.port, DEFAULT_PORT);
    }
}
