//! 目录枚举与排序：每次请求都重新扫描文件系统，不做缓存。

use std::io;
use std::path::Path;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};
use futures_util::stream::{self, Stream, TryStreamExt};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, warn};

use crate::atomic::is_temp_name;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub name: String,
    pub kind: EntryKind,
    pub size: u64,
    pub modified: Option<SystemTime>,
    pub extension: String,
}

impl DirectoryEntry {
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    /// 修改时间（秒），元数据不可读时为 0。
    pub fn timestamp(&self) -> u64 {
        self.modified
            .and_then(|ts| ts.duration_since(UNIX_EPOCH).ok())
            .map(|duration| duration.as_secs())
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortKey {
    #[default]
    Name,
    Size,
    Format,
    Date,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortKey {
    pub const ALL: [SortKey; 4] = [SortKey::Name, SortKey::Size, SortKey::Format, SortKey::Date];

    pub fn as_str(self) -> &'static str {
        match self {
            SortKey::Name => "name",
            SortKey::Size => "size",
            SortKey::Format => "format",
            SortKey::Date => "date",
        }
    }

    /// 解析查询参数；未知值回退为默认值。
    pub fn from_query(value: Option<&str>) -> Self {
        value.and_then(|v| v.parse().ok()).unwrap_or_default()
    }
}

impl FromStr for SortKey {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "name" => Ok(SortKey::Name),
            "size" => Ok(SortKey::Size),
            "format" => Ok(SortKey::Format),
            "date" => Ok(SortKey::Date),
            _ => Err(()),
        }
    }
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            SortOrder::Asc => SortOrder::Desc,
            SortOrder::Desc => SortOrder::Asc,
        }
    }

    pub fn from_query(value: Option<&str>) -> Self {
        value.and_then(|v| v.parse().ok()).unwrap_or_default()
    }
}

impl FromStr for SortOrder {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Error)]
pub enum ListError {
    #[error("directory not found")]
    NotFound,
    #[error("cannot list directory: {0}")]
    Unreadable(#[source] io::Error),
}

/// 列出目录的直接子项并按给定键排序。
///
/// 单个条目的元数据读取失败不会中断整个列表：该条目按最差键值参与排序。
/// 目录无法打开或遍历中途出错时返回 [`ListError`]，不会给出部分结果。
pub async fn list_directory(
    directory: &Path,
    key: SortKey,
    order: SortOrder,
) -> Result<Vec<DirectoryEntry>, ListError> {
    let dir = fs::read_dir(directory).await.map_err(|err| match err.kind() {
        io::ErrorKind::NotFound => ListError::NotFound,
        _ => ListError::Unreadable(err),
    })?;
    let scanned = stream::unfold(dir, |mut dir| async move {
        match dir.next_entry().await {
            Ok(Some(entry)) => Some((Ok(entry), dir)),
            Ok(None) => None,
            Err(err) => Some((Err(err), dir)),
        }
    });
    let raw = scan_all(scanned, directory).await?;
    let mut entries = Vec::with_capacity(raw.len());

    for entry in raw {
        let name = entry.file_name().to_string_lossy().into_owned();
        if is_temp_name(&name) {
            continue;
        }

        let file_type = entry.file_type().await.ok();
        if file_type.is_some_and(|ft| ft.is_symlink()) {
            continue;
        }

        let metadata = match entry.metadata().await {
            Ok(metadata) => Some(metadata),
            Err(err) => {
                debug!(name, error = %err, "entry metadata unreadable");
                None
            }
        };
        let is_dir = metadata
            .as_ref()
            .map(|m| m.is_dir())
            .or_else(|| file_type.map(|ft| ft.is_dir()))
            .unwrap_or(false);

        let (kind, size, extension) = if is_dir {
            (EntryKind::Directory, 0, String::new())
        } else {
            (
                EntryKind::File,
                metadata.as_ref().map(|m| m.len()).unwrap_or(0),
                extension_of(&name),
            )
        };

        entries.push(DirectoryEntry {
            modified: metadata.as_ref().and_then(|m| m.modified().ok()),
            name,
            kind,
            size,
            extension,
        });
    }

    sort_entries(&mut entries, key, order);
    Ok(entries)
}

/// 读完整个目录流；中途任何错误都使整次列表失败。
async fn scan_all<S, T>(entries: S, directory: &Path) -> Result<Vec<T>, ListError>
where
    S: Stream<Item = io::Result<T>>,
{
    entries.try_collect().await.map_err(|err| {
        warn!(path = ?directory, error = %err, "directory scan interrupted");
        ListError::Unreadable(err)
    })
}

/// 稳定的全序：主键可反向，名称作为最终决胜键。
pub fn sort_entries(entries: &mut [DirectoryEntry], key: SortKey, order: SortOrder) {
    entries.sort_by(|a, b| {
        let primary = match key {
            SortKey::Name => a.name.cmp(&b.name),
            SortKey::Size => a.size.cmp(&b.size),
            SortKey::Format => a.extension.cmp(&b.extension),
            SortKey::Date => a.timestamp().cmp(&b.timestamp()),
        };
        let primary = match order {
            SortOrder::Asc => primary,
            SortOrder::Desc => primary.reverse(),
        };
        primary.then_with(|| a.name.cmp(&b.name))
    });
}

/// 小写扩展名，不含点号。
pub fn extension_of(name: &str) -> String {
    Path::new(name)
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}
