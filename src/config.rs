use crate::board::DueDateBoard;
use crate::calendar::CalendarPolicy;
use crate::persistence::{self, PersistenceResult};
use std::net::{AddrParseError, SocketAddr};
use std::path::PathBuf;
use thiserror::Error;
use tracing::info;

pub const HTTP_ADDR_VAR: &str = "DUE_DATE_HTTP_ADDR";
pub const POLICY_PATH_VAR: &str = "DUE_DATE_POLICY";
pub const STORE_PATH_VAR: &str = "DUE_DATE_STORE";
pub const DEFAULT_HTTP_ADDR: &str = "0.0.0.0:3000";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} is not a valid socket address ('{value}'): {source}")]
    InvalidAddr {
        var: &'static str,
        value: String,
        #[source]
        source: AddrParseError,
    },
}

/// Runtime settings for the binaries, read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub http_addr: SocketAddr,
    pub policy_path: Option<PathBuf>,
    pub store_path: Option<PathBuf>,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let addr = non_empty(HTTP_ADDR_VAR).unwrap_or_else(|| DEFAULT_HTTP_ADDR.to_string());
        let http_addr = addr
            .trim()
            .parse()
            .map_err(|source| ConfigError::InvalidAddr {
                var: HTTP_ADDR_VAR,
                value: addr.clone(),
                source,
            })?;

        Ok(Self {
            http_addr,
            policy_path: non_empty(POLICY_PATH_VAR).map(PathBuf::from),
            store_path: non_empty(STORE_PATH_VAR).map(PathBuf::from),
        })
    }

    /// Policy from the configured file, or the default policy.
    pub fn load_policy(&self) -> PersistenceResult<CalendarPolicy> {
        match &self.policy_path {
            Some(path) => {
                let policy = persistence::load_policy_from_json(path)?;
                info!(path = %path.display(), "loaded calendar policy");
                Ok(policy)
            }
            None => Ok(CalendarPolicy::default()),
        }
    }

    /// Board from the configured store when it holds one; otherwise an empty
    /// board with the configured policy. A policy file overrides the stored
    /// policy and refreshes suggestions.
    pub fn load_board(&self) -> PersistenceResult<DueDateBoard> {
        let stored = self.load_stored_board()?;
        match stored {
            Some(mut board) => {
                if self.policy_path.is_some() {
                    board.set_policy(self.load_policy()?)?;
                }
                Ok(board)
            }
            None => Ok(DueDateBoard::new(self.load_policy()?)),
        }
    }

    #[cfg(feature = "sqlite")]
    fn load_stored_board(&self) -> PersistenceResult<Option<DueDateBoard>> {
        use crate::persistence::BoardStore;
        use crate::persistence::sqlite::SqliteBoardStore;

        let Some(path) = &self.store_path else {
            return Ok(None);
        };
        let board = SqliteBoardStore::new(path)?.load_board()?;
        if let Some(board) = &board {
            info!(path = %path.display(), tasks = board.tasks().len(), "loaded board from store");
        }
        Ok(board)
    }

    #[cfg(not(feature = "sqlite"))]
    fn load_stored_board(&self) -> PersistenceResult<Option<DueDateBoard>> {
        if let Some(path) = &self.store_path {
            tracing::warn!(
                path = %path.display(),
                "{} ignored: built without the sqlite feature",
                STORE_PATH_VAR
            );
        }
        Ok(None)
    }
}
