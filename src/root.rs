//! 运行时共享根目录：请求开始时取一次快照，管理操作可原子替换。

use std::collections::VecDeque;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::config::{ConfigError, ROOT_SEARCH_MAX_DEPTH, ServerConfig};
use crate::storage::Storage;

#[derive(Debug, Error)]
pub enum RootError {
    #[error("new_root field is missing")]
    EmptyInput,
    #[error("home directory is unknown")]
    NoHomeDir,
    #[error("{}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },
    #[error("{} is not a directory", .0.display())]
    NotADirectory(PathBuf),
    #[error(transparent)]
    Persist(#[from] ConfigError),
}

/// 配置存储：当前根目录快照与需要回写的配置记录。
#[derive(Debug)]
pub struct RootStore {
    current: RwLock<Arc<Storage>>,
    config: Mutex<ServerConfig>,
    config_path: PathBuf,
    home: Option<PathBuf>,
}

impl RootStore {
    pub fn new(root: PathBuf, config: ServerConfig, config_path: PathBuf) -> Self {
        Self {
            current: RwLock::new(Arc::new(Storage::new(root))),
            config: Mutex::new(config),
            config_path,
            home: dirs::home_dir(),
        }
    }

    #[cfg(test)]
    fn with_home(mut self, home: PathBuf) -> Self {
        self.home = Some(home);
        self
    }

    /// 当前根目录的快照；同一请求内应只取一次。
    pub fn current(&self) -> Arc<Storage> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn get_root(&self) -> PathBuf {
        self.current().root_path().to_path_buf()
    }

    /// 切换根目录：展开、创建、回写配置，全部成功后才替换。
    pub async fn set_root(&self, input: &str) -> Result<PathBuf, RootError> {
        let requested = expand_root_input(input, self.home.as_deref())?;
        fs::create_dir_all(&requested)
            .await
            .map_err(|source| RootError::Io {
                path: requested.clone(),
                source,
            })?;
        let resolved = fs::canonicalize(&requested)
            .await
            .map_err(|source| RootError::Io {
                path: requested.clone(),
                source,
            })?;
        if !fs::metadata(&resolved)
            .await
            .map(|metadata| metadata.is_dir())
            .unwrap_or(false)
        {
            return Err(RootError::NotADirectory(resolved));
        }

        let mut config = self.config.lock().await;
        let updated = config.with_directory(&resolved);
        updated.save(&self.config_path).await?;
        *config = updated;

        let previous = {
            let mut current = self
                .current
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *current, Arc::new(Storage::new(resolved.clone())))
        };
        info!(from = ?previous.root_path(), to = ?resolved, "root directory changed");
        Ok(resolved)
    }
}

/// 展开 `~` 前缀；相对路径以家目录为基准。
pub fn expand_root_input(input: &str, home: Option<&Path>) -> Result<PathBuf, RootError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(RootError::EmptyInput);
    }
    let home_dir = || home.map(Path::to_path_buf).ok_or(RootError::NoHomeDir);

    if trimmed == "~" {
        return home_dir();
    }
    if let Some(rest) = trimmed
        .strip_prefix("~/")
        .or_else(|| trimmed.strip_prefix("~\\"))
    {
        return Ok(home_dir()?.join(rest));
    }
    let path = PathBuf::from(trimmed);
    if path.is_absolute() {
        return Ok(path);
    }
    Ok(home_dir()?.join(path))
}

/// 启动时定位根目录：先按配置展开，不存在时在家目录下按名称广度优先查找。
pub async fn locate_startup_root(configured: &str) -> Option<PathBuf> {
    let home = dirs::home_dir();
    let expanded = match configured.trim() {
        "~" => home.clone()?,
        value => match value.strip_prefix("~/") {
            Some(rest) => home.as_ref()?.join(rest),
            None => PathBuf::from(value),
        },
    };
    let absolute = if expanded.is_absolute() {
        expanded
    } else {
        std::env::current_dir().ok()?.join(expanded)
    };

    if fs::metadata(&absolute).await.is_ok_and(|m| m.is_dir()) {
        return fs::canonicalize(&absolute).await.ok();
    }

    let name = absolute.file_name()?.to_os_string();
    let search_root = home?;
    warn!(path = ?absolute, "root directory not found, searching under {:?}", search_root);
    let found = tokio::task::spawn_blocking(move || {
        find_directory(&search_root, &name.to_string_lossy(), ROOT_SEARCH_MAX_DEPTH)
    })
    .await
    .ok()
    .flatten();
    match &found {
        Some(path) => info!(path = ?path, "found root directory"),
        None => warn!("no matching directory found"),
    }
    found
}

/// 广度优先查找名为 `name` 的目录，跳过隐藏目录与符号链接。
pub fn find_directory(start: &Path, name: &str, max_depth: usize) -> Option<PathBuf> {
    let mut queue = VecDeque::from([(start.to_path_buf(), 0usize)]);
    while let Some((dir, depth)) = queue.pop_front() {
        let Ok(read_dir) = std::fs::read_dir(&dir) else {
            continue;
        };
        for entry in read_dir.flatten() {
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            if !file_type.is_dir() {
                continue;
            }
            let entry_name = entry.file_name();
            let entry_name = entry_name.to_string_lossy();
            if entry_name == name {
                return Some(entry.path());
            }
            if depth + 1 < max_depth && !entry_name.starts_with('.') {
                queue.push_back((entry.path(), depth + 1));
            }
        }
    }
    None
}
