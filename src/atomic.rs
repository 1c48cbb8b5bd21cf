//! 临时写入与原子替换：上传文件与配置回写都经由这里落盘。

use std::ffi::OsStr;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use uuid::Uuid;

/// 上传临时文件名中的标记，目录列表据此隐藏未完成的写入。
pub const TEMP_MARKER: &str = ".upload-";

/// 同目录临时文件，提交时 rename 到目标路径。
pub struct AtomicFile {
    target: PathBuf,
    temp_path: PathBuf,
    file: File,
}

impl AtomicFile {
    /// 在目标路径同目录创建临时文件。
    pub async fn new(target: &Path) -> io::Result<Self> {
        let parent = match target.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            Some(_) => Path::new("."),
            None => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "target has no parent directory",
                ));
            }
        };
        let base = target
            .file_name()
            .map(OsStr::to_string_lossy)
            .unwrap_or_else(|| "file".into());
        let temp_path = parent.join(format!(".{base}{TEMP_MARKER}{}", Uuid::new_v4()));
        let file = File::create(&temp_path).await?;
        Ok(Self {
            target: target.to_path_buf(),
            temp_path,
            file,
        })
    }

    pub fn file_mut(&mut self) -> &mut File {
        &mut self.file
    }

    /// 放弃写入并删除临时文件。
    pub async fn discard(self) {
        drop(self.file);
        let _ = fs::remove_file(&self.temp_path).await;
    }

    /// 刷盘后替换目标文件；失败时临时文件被清理。
    pub async fn commit(self) -> io::Result<()> {
        if let Err(err) = self.file.sync_all().await {
            drop(self.file);
            let _ = fs::remove_file(&self.temp_path).await;
            return Err(err);
        }
        drop(self.file);

        if let Err(err) = fs::rename(&self.temp_path, &self.target).await {
            #[cfg(windows)]
            {
                if fs::remove_file(&self.target).await.is_ok()
                    && fs::rename(&self.temp_path, &self.target).await.is_ok()
                {
                    return Ok(());
                }
            }
            let _ = fs::remove_file(&self.temp_path).await;
            return Err(err);
        }

        Ok(())
    }
}

/// 判断目录项是否为未完成的上传临时文件。
pub fn is_temp_name(name: &str) -> bool {
    name.starts_with('.') && name.contains(TEMP_MARKER)
}
