//! Configuration for the Shellhub daemon.

use crate::document::Source;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Daemon configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Unix socket path for IPC
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,

    /// Data directory holding the index database
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// PID file path
    #[serde(default = "default_pid_file")]
    pub pid_file: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Index database file name, relative to `data_dir`
    #[serde(default = "default_database")]
    pub database: String,

    #[serde(default)]
    pub scan: ScanConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub paging: PagingConfig,

    /// Sources seeded into an empty index and restored by a reset
    #[serde(default)]
    pub default_endpoints: Vec<Source>,
}

/// Scan scheduling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Pause between the end of one scan and the next scan of the same source
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,

    /// Watch local filesystem sources and rescan on change
    #[serde(default = "default_true")]
    pub watch_local_sources: bool,

    /// Debounce window for filesystem events
    #[serde(default = "default_watch_debounce_ms")]
    pub watch_debounce_ms: u64,
}

/// Content cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of materialized documents kept in memory
    #[serde(default = "default_max_documents")]
    pub max_documents: usize,
}

/// Paging limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagingConfig {
    #[serde(default = "default_page_limit")]
    pub default_limit: usize,

    #[serde(default = "default_max_limit")]
    pub max_limit: usize,
}

fn default_socket_path() -> PathBuf {
    PathBuf::from("/tmp/shellhub.sock")
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".shellhub")
}

fn default_pid_file() -> PathBuf {
    PathBuf::from("/tmp/shellhub.pid")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_database() -> String {
    "index.db".to_string()
}

fn default_cooldown_secs() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

fn default_watch_debounce_ms() -> u64 {
    500
}

fn default_max_documents() -> usize {
    1024
}

fn default_page_limit() -> usize {
    25
}

fn default_max_limit() -> usize {
    500
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: default_cooldown_secs(),
            watch_local_sources: true,
            watch_debounce_ms: default_watch_debounce_ms(),
        }
    }
}

impl ScanConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.watch_debounce_ms)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_documents: default_max_documents(),
        }
    }
}

impl Default for PagingConfig {
    fn default() -> Self {
        Self {
            default_limit: default_page_limit(),
            max_limit: default_max_limit(),
        }
    }
}

impl PagingConfig {
    /// Clamp a requested page size into `[1, max_limit]`.
    pub fn clamp(&self, limit: usize) -> usize {
        limit.clamp(1, self.max_limit.max(1))
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            data_dir: default_data_dir(),
            pid_file: default_pid_file(),
            log_level: default_log_level(),
            database: default_database(),
            scan: ScanConfig::default(),
            cache: CacheConfig::default(),
            paging: PagingConfig::default(),
            default_endpoints: Vec::new(),
        }
    }
}

impl DaemonConfig {
    /// Load configuration from file, falling back to defaults
    pub fn load() -> Self {
        let config_path = default_data_dir().join("config.yaml");

        if config_path.exists() {
            match std::fs::read_to_string(&config_path) {
                Ok(content) => match serde_yaml::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config file: {}", e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config file: {}", e);
                }
            }
        }

        Self::default()
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// Location of the index database
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database)
    }

    /// Ensure data directories exist
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.data_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SourceKind;

    #[test]
    fn test_default_config() {
        let config = DaemonConfig::default();
        assert_eq!(config.socket_path, PathBuf::from("/tmp/shellhub.sock"));
        assert_eq!(config.scan.cooldown(), Duration::from_secs(60));
        assert_eq!(config.cache.max_documents, 1024);
        assert_eq!(config.paging.default_limit, 25);
        assert!(config.default_endpoints.is_empty());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
log_level: debug
scan:
  cooldown_secs: 5
default_endpoints:
  - name: local
    url: /srv/shells
    kind: file_system
"#;
        let config: DaemonConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.scan.cooldown_secs, 5);
        assert!(config.scan.watch_local_sources);
        assert_eq!(config.paging.max_limit, 500);
        assert_eq!(config.default_endpoints.len(), 1);
        assert_eq!(config.default_endpoints[0].kind, SourceKind::FileSystem);
        assert_eq!(config.default_endpoints[0].version, "v3");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "database: shells.db\n").unwrap();

        let config = DaemonConfig::load_from(&path).unwrap();
        assert_eq!(config.database_path(), config.data_dir.join("shells.db"));

        std::fs::write(&path, "scan: [not, a, map]\n").unwrap();
        assert!(DaemonConfig::load_from(&path).is_err());
    }

    #[test]
    fn test_paging_clamp() {
        let paging = PagingConfig::default();
        assert_eq!(paging.clamp(0), 1);
        assert_eq!(paging.clamp(10), 10);
        assert_eq!(paging.clamp(10_000), 500);
    }
}
