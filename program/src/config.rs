// Lucky Draw Engine - Service configuration
use std::{env, path::PathBuf, sync::Arc};

use crate::{
    error::DrawError,
    store::{FileStore, MemoryStore, StateStore},
};

/// Directory holding one JSON document per user
pub const DATA_DIR_ENV: &str = "LUCKY_DRAW_DATA_DIR";
/// Set to `0` or `false` to silence warnings for rejected requests
pub const LOG_REJECTIONS_ENV: &str = "LUCKY_DRAW_LOG_REJECTIONS";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// File store location, in-memory store when unset
    pub data_dir: Option<PathBuf>,
    /// Log domain and validation rejections at warn level
    pub log_rejections: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: None,
            log_rejections: true,
        }
    }
}

impl Config {
    /// Defaults overridden by the process environment
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(dir) = env::var_os(DATA_DIR_ENV).filter(|v| !v.is_empty()) {
            config.data_dir = Some(PathBuf::from(dir));
        }
        if let Ok(flag) = env::var(LOG_REJECTIONS_ENV) {
            config.log_rejections = !matches!(flag.trim(), "0" | "false" | "no" | "off");
        }
        config
    }

    pub fn open_store(&self) -> Result<Arc<dyn StateStore>, DrawError> {
        Ok(match &self.data_dir {
            Some(dir) => Arc::new(FileStore::open(dir)?),
            None => Arc::new(MemoryStore::new()),
        })
    }
}
