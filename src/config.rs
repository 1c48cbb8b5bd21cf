//! CLI 参数、服务端常量与 YAML 配置记录。

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::atomic::AtomicFile;

pub const AUTH_REALM: &str = "File Server";
pub const ADMIN_ROUTE: &str = "/set_root";
pub const DEFAULT_CONFIG_PATH: &str = "credentials.yaml";
pub const DEFAULT_AUTH_WINDOW_SECS: u64 = 15 * 60;
pub const DEFAULT_AUTH_MAX_FAILURES: usize = 5;
pub const RATE_LIMIT_SWEEP_INTERVAL_SECS: u64 = 300;
pub const MULTIPART_HEADER_LINE_LIMIT: usize = 8 * 1024;
pub const ROOT_SEARCH_MAX_DEPTH: usize = 6;

/// CLI arguments and environment configuration for the server.
#[derive(Parser, Debug)]
#[command(name = "lanbox", version, about = "Personal LAN file server")]
pub struct Args {
    #[arg(
        short = 'c',
        long,
        env = "LANBOX_CONFIG",
        default_value = DEFAULT_CONFIG_PATH,
        help = "YAML configuration record (port, directory, credentials)"
    )]
    pub config: PathBuf,
    #[arg(
        short = 'b',
        long,
        env = "LANBOX_BIND",
        default_value = "0.0.0.0",
        help = "Bind address"
    )]
    pub bind: String,
    #[arg(
        short = 'p',
        long,
        env = "LANBOX_PORT",
        help = "Override the port from the configuration record"
    )]
    pub port: Option<u16>,
    #[arg(
        long,
        env = "LANBOX_AUTH_WINDOW_SECS",
        default_value_t = DEFAULT_AUTH_WINDOW_SECS,
        help = "Sliding window for failed auth attempts in seconds"
    )]
    pub auth_window_secs: u64,
    #[arg(
        long,
        env = "LANBOX_AUTH_MAX_FAILURES",
        default_value_t = DEFAULT_AUTH_MAX_FAILURES,
        help = "Failed auth attempts per client before rejecting (0 to disable)"
    )]
    pub auth_max_failures: usize,
    #[arg(long, env = "LANBOX_NO_QR", help = "Do not print the QR code banner")]
    pub no_qr: bool,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("cannot parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("invalid port {0}, expected 1-65535")]
    InvalidPort(u16),
    #[error("cannot serialize configuration: {0}")]
    Serialize(#[from] serde_yaml::Error),
    #[error("cannot write {}: {source}", path.display())]
    Write { path: PathBuf, source: io::Error },
}

/// 持久化的配置记录，与磁盘上的 YAML 结构一一对应。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub server: ServerSection,
    pub auth: AuthSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSection {
    pub port: u16,
    pub directory: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthSection {
    pub username: String,
    pub password: String,
}

impl ServerConfig {
    /// 读取并校验配置文件。
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        let config: ServerConfig =
            serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        if config.server.port == 0 {
            return Err(ConfigError::InvalidPort(config.server.port));
        }
        Ok(config)
    }

    /// 原子写回配置文件（临时文件 + rename）。
    pub async fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let serialized = serde_yaml::to_string(self)?;
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        let mut atomic = AtomicFile::new(path).await.map_err(write_err)?;
        if let Err(err) = atomic.file_mut().write_all(serialized.as_bytes()).await {
            atomic.discard().await;
            return Err(write_err(err));
        }
        atomic.commit().await.map_err(write_err)
    }

    pub fn with_directory(&self, directory: &Path) -> Self {
        let mut updated = self.clone();
        updated.server.directory = directory.to_string_lossy().into_owned();
        updated
    }
}
