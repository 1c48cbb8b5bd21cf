use std::io;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tokio::io::ErrorKind;

/// 一个已确定的共享根目录；所有请求路径都相对它解析。
#[derive(Clone, Debug)]
pub struct Storage {
    root: PathBuf,
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid path")]
    InvalidPath,
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Storage {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root_path(&self) -> &Path {
        &self.root
    }

    /// 解析请求路径并拒绝经过符号链接的组件。
    pub async fn resolve_path_checked(
        &self,
        relative: &str,
        allow_missing_leaf: bool,
    ) -> Result<PathBuf, StorageError> {
        let target = self.resolve(relative);
        self.ensure_no_symlink_components(&target, allow_missing_leaf)
            .await?;
        Ok(target)
    }

    /// 词法规范化：`.` 丢弃，`..` 在根处截止，反斜杠视作分隔符。
    pub fn resolve(&self, relative: &str) -> PathBuf {
        let unified = relative.replace('\\', "/");
        let mut normalized = PathBuf::new();
        for component in Path::new(unified.trim_start_matches('/')).components() {
            match component {
                Component::Normal(segment) => normalized.push(segment),
                Component::ParentDir => {
                    normalized.pop();
                }
                Component::CurDir | Component::RootDir | Component::Prefix(_) => continue,
            }
        }

        self.root.join(normalized)
    }

    async fn ensure_no_symlink_components(
        &self,
        target: &Path,
        allow_missing_leaf: bool,
    ) -> Result<(), StorageError> {
        let relative = target
            .strip_prefix(&self.root)
            .map_err(|_| StorageError::InvalidPath)?;
        let mut current = PathBuf::from(&self.root);
        let mut components = relative.components().peekable();

        while let Some(component) = components.next() {
            current.push(component.as_os_str());
            match fs::symlink_metadata(&current).await {
                Ok(metadata) => {
                    if metadata.file_type().is_symlink() {
                        return Err(StorageError::InvalidPath);
                    }
                    if components.peek().is_some() && !metadata.is_dir() {
                        return Err(StorageError::InvalidPath);
                    }
                }
                Err(err) if err.kind() == ErrorKind::NotFound && allow_missing_leaf => {
                    return Ok(());
                }
                Err(err) => return Err(StorageError::Io(err)),
            }
        }

        Ok(())
    }
}
