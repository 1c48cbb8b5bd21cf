//! 下载响应的 ETag 与 If-None-Match 判定。

use axum::http::{HeaderMap, header};
use std::fs::Metadata;
use std::time::UNIX_EPOCH;

/// 根据文件大小与修改时间生成弱 ETag。
pub fn etag_from_metadata(metadata: &Metadata) -> String {
    let size = metadata.len();
    if let Ok(modified) = metadata.modified()
        && let Ok(duration) = modified.duration_since(UNIX_EPOCH)
    {
        return format!(
            "W/\"{}-{}-{}\"",
            size,
            duration.as_secs(),
            duration.subsec_nanos()
        );
    }
    format!("W/\"{size}\"")
}

/// 客户端缓存仍然有效时返回 true（应答 304）。
pub fn is_not_modified(headers: &HeaderMap, current_etag: &str) -> bool {
    headers
        .get(header::IF_NONE_MATCH)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| {
            value.trim() == "*"
                || value
                    .split(',')
                    .map(str::trim)
                    .any(|item| weak_eq(item, current_etag))
        })
}

/// 强比较：任一方为弱标签即不匹配。
pub fn strong_match(left: &str, right: &str) -> bool {
    !left.starts_with("W/") && !right.starts_with("W/") && left == right
}

fn weak_eq(left: &str, right: &str) -> bool {
    left.trim_start_matches("W/") == right.trim_start_matches("W/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use tempfile::tempdir;

    #[test]
    fn etag_tracks_size_and_if_none_match_uses_weak_comparison() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("a.txt");
        std::fs::write(&path, b"hello").expect("write");
        let etag = etag_from_metadata(&std::fs::metadata(&path).expect("metadata"));
        assert!(etag.starts_with("W/\"5-"));

        let mut headers = HeaderMap::new();
        assert!(!is_not_modified(&headers, &etag));
        let strong = etag.trim_start_matches("W/").to_string();
        headers.insert(
            header::IF_NONE_MATCH,
            HeaderValue::from_str(&format!("\"other\", {strong}")).expect("header"),
        );
        assert!(is_not_modified(&headers, &etag));
    }
}
