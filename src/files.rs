//! 路径请求分发：目录浏览、文件下载与上传入口。

use axum::body::Body as AxumBody;
use axum::extract::{Extension, Query, Request};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use httpdate::{fmt_http_date, parse_http_date};
use serde::Deserialize;
use std::io::SeekFrom;
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::fs::{self, File};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};

use crate::error::ApiError;
use crate::etag::{etag_from_metadata, is_not_modified, strong_match};
use crate::html::{render_listing, render_listing_failure};
use crate::listing::{ListError, SortKey, SortOrder, list_directory};
use crate::root::RootStore;
use crate::storage::{Storage, StorageError};
use crate::upload;

#[derive(Deserialize, Default)]
pub(crate) struct ListingQuery {
    sort: Option<String>,
    dir: Option<String>,
}

/// 所有非管理路由的入口：GET/HEAD 浏览或下载，POST 上传。
pub async fn serve_path(
    Extension(root): Extension<Arc<RootStore>>,
    request: Request,
) -> Result<Response, ApiError> {
    let path = urlencoding::decode(request.uri().path())
        .map_err(|_| ApiError::NotFound("Not found".into()))?
        .into_owned();
    // 请求开始时取一次快照，之后的切换不影响本请求。
    let storage = root.current();

    match *request.method() {
        Method::GET | Method::HEAD => {
            let query = Query::<ListingQuery>::try_from_uri(request.uri())
                .map(|Query(query)| query)
                .unwrap_or_default();
            browse(&storage, &path, &query, request.headers()).await
        }
        Method::POST => {
            let (parts, body) = request.into_parts();
            upload::upload_file(&storage, &path, &parts.headers, body).await
        }
        _ => Err(ApiError::MethodNotAllowed),
    }
}

async fn browse(
    storage: &Storage,
    path: &str,
    query: &ListingQuery,
    headers: &HeaderMap,
) -> Result<Response, ApiError> {
    let target = storage
        .resolve_path_checked(path, false)
        .await
        .map_err(|err| match err {
            StorageError::InvalidPath => ApiError::NotFound("Not found".into()),
            other => other.into(),
        })?;
    let metadata = fs::metadata(&target).await.map_err(StorageError::from)?;

    if !metadata.is_dir() {
        return download_file(&target, path, headers).await;
    }

    let key = SortKey::from_query(query.sort.as_deref());
    let order = SortOrder::from_query(query.dir.as_deref());
    match list_directory(&target, key, order).await {
        Ok(entries) => {
            info!(path, count = entries.len(), "list directory");
            Ok(Html(render_listing(path, &entries, key, order)).into_response())
        }
        Err(ListError::NotFound) => Err(ApiError::NotFound("Not found".into())),
        Err(ListError::Unreadable(err)) => {
            warn!(path, error = %err, "cannot list directory");
            Ok(Html(render_listing_failure(path)).into_response())
        }
    }
}

/// 下载文件，支持 Range 请求与缓存相关头。
async fn download_file(
    target: &Path,
    path: &str,
    request_headers: &HeaderMap,
) -> Result<Response, ApiError> {
    let metadata = fs::metadata(target).await.map_err(StorageError::from)?;
    let file_size = metadata.len();
    let modified = metadata.modified().ok();
    let mime = mime_guess::from_path(target).first_or_octet_stream();
    let etag = etag_from_metadata(&metadata);

    let mut response_headers = HeaderMap::new();
    response_headers.insert(header::CONTENT_TYPE, header_value(mime.essence_str())?);
    response_headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    response_headers.insert(header::ETAG, header_value(&etag)?);
    if let Some(modified) = modified {
        response_headers.insert(header::LAST_MODIFIED, header_value(&fmt_http_date(modified))?);
    }
    let filename = target
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    response_headers.insert(
        header::CONTENT_DISPOSITION,
        header_value(&content_disposition(&filename))?,
    );

    if is_not_modified(request_headers, &etag) {
        return Ok((StatusCode::NOT_MODIFIED, response_headers).into_response());
    }

    let if_range_matches = if_range_allows(request_headers, &etag, modified);

    let range = if if_range_matches {
        parse_range(request_headers.get(header::RANGE), file_size)?
    } else {
        None
    };

    let mut file = File::open(target).await.map_err(StorageError::from)?;

    if let Some((start, end)) = range {
        let length = end - start + 1;
        debug!(path, start, end, length, "download range request accepted");
        file.seek(SeekFrom::Start(start))
            .await
            .map_err(|err| ApiError::Internal(err.to_string()))?;
        let stream = ReaderStream::new(file.take(length));
        response_headers.insert(
            header::CONTENT_RANGE,
            header_value(&format!("bytes {start}-{end}/{file_size}"))?,
        );
        response_headers.insert(header::CONTENT_LENGTH, header_value(&length.to_string())?);
        return Ok((
            StatusCode::PARTIAL_CONTENT,
            response_headers,
            AxumBody::from_stream(stream),
        )
            .into_response());
    }

    response_headers.insert(header::CONTENT_LENGTH, header_value(&file_size.to_string())?);
    info!(path, size = file_size, "download full file");
    Ok((
        StatusCode::OK,
        response_headers,
        AxumBody::from_stream(ReaderStream::new(file)),
    )
        .into_response())
}

/// `If-Range` 校验：实体标签用强比较，日期与 `Last-Modified` 比较。
fn if_range_allows(headers: &HeaderMap, etag: &str, modified: Option<SystemTime>) -> bool {
    let Some(value) = headers
        .get(header::IF_RANGE)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
    else {
        return true;
    };
    if value.starts_with('"') || value.starts_with("W/") {
        return strong_match(value, etag);
    }
    match parse_http_date(value) {
        Ok(date) => modified.is_some_and(|ts| ts <= date),
        Err(_) => false,
    }
}

fn header_value(value: &str) -> Result<HeaderValue, ApiError> {
    HeaderValue::from_str(value).map_err(|_| ApiError::Internal("响应头构建失败".into()))
}

/// `attachment` 形式，附带 ASCII 回退名与 RFC 5987 编码名。
fn content_disposition(filename: &str) -> String {
    let fallback: String = filename
        .chars()
        .map(|ch| match ch {
            '"' | '\\' => '_',
            ch if ch.is_ascii() && !ch.is_ascii_control() => ch,
            _ => '_',
        })
        .collect();
    format!(
        "attachment; filename=\"{fallback}\"; filename*=UTF-8''{}",
        urlencoding::encode(filename)
    )
}

/// 解析 Range 头，返回可读取的范围。
fn parse_range(
    value: Option<&HeaderValue>,
    file_size: u64,
) -> Result<Option<(u64, u64)>, ApiError> {
    let Some(value) = value else {
        return Ok(None);
    };
    if file_size == 0 {
        return Err(ApiError::RangeNotSatisfiable(file_size));
    }
    let value = value
        .to_str()
        .map_err(|_| ApiError::BadRequest("invalid Range header".into()))?;
    let Some(range) = value.strip_prefix("bytes=") else {
        return Err(ApiError::BadRequest("invalid Range header".into()));
    };
    if range.contains(',') {
        return Err(ApiError::BadRequest("multiple ranges not supported".into()));
    }

    let (start_part, end_part) = range.split_once('-').unwrap_or((range, ""));
    let invalid = || ApiError::BadRequest("invalid Range header".into());

    let (start, end) = if start_part.is_empty() {
        let suffix: u64 = end_part.parse().map_err(|_| invalid())?;
        if suffix == 0 {
            return Ok(None);
        }
        (file_size.saturating_sub(suffix), file_size - 1)
    } else {
        let start: u64 = start_part.parse().map_err(|_| invalid())?;
        let end: u64 = if end_part.is_empty() {
            file_size - 1
        } else {
            end_part.parse::<u64>().map_err(|_| invalid())?.min(file_size - 1)
        };
        (start, end)
    };

    if start > end || start >= file_size {
        return Err(ApiError::RangeNotSatisfiable(file_size));
    }
    Ok(Some((start, end)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(value: &str, size: u64) -> Result<Option<(u64, u64)>, ApiError> {
        parse_range(Some(&HeaderValue::from_str(value).expect("header")), size)
    }

    #[test]
    fn range_forms_are_resolved_against_file_size() {
        assert_eq!(range("bytes=0-4", 10).expect("range"), Some((0, 4)));
        assert_eq!(range("bytes=6-", 10).expect("open"), Some((6, 9)));
        assert_eq!(range("bytes=-3", 10).expect("suffix"), Some((7, 9)));
        assert_eq!(range("bytes=5-100", 10).expect("clamped"), Some((5, 9)));
        assert!(matches!(
            range("bytes=10-12", 10),
            Err(ApiError::RangeNotSatisfiable(10))
        ));
        assert!(matches!(range("items=0-1", 10), Err(ApiError::BadRequest(_))));
        assert!(matches!(range("bytes=0-1,3-4", 10), Err(ApiError::BadRequest(_))));
        assert_eq!(parse_range(None, 10).expect("none"), None);
    }

    #[test]
    fn if_range_needs_strong_validator() {
        let modified = SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(1_700_000_000);
        let mut headers = HeaderMap::new();
        assert!(if_range_allows(&headers, "W/\"5-1\"", Some(modified)));

        headers.insert(header::IF_RANGE, HeaderValue::from_static("W/\"5-1\""));
        assert!(!if_range_allows(&headers, "W/\"5-1\"", Some(modified)));

        headers.insert(header::IF_RANGE, HeaderValue::from_static("\"5-1\""));
        assert!(!if_range_allows(&headers, "W/\"5-1\"", Some(modified)));
        assert!(if_range_allows(&headers, "\"5-1\"", Some(modified)));

        headers.insert(
            header::IF_RANGE,
            HeaderValue::from_str(&fmt_http_date(modified)).expect("date"),
        );
        assert!(if_range_allows(&headers, "W/\"5-1\"", Some(modified)));
        assert!(!if_range_allows(&headers, "W/\"5-1\"", None));
    }

    #[test]
    fn disposition_keeps_utf8_name_and_ascii_fallback() {
        assert_eq!(
            content_disposition("report.pdf"),
            "attachment; filename=\"report.pdf\"; filename*=UTF-8''report.pdf"
        );
        assert_eq!(
            content_disposition("照片 1.jpg"),
            "attachment; filename=\"__ 1.jpg\"; filename*=UTF-8''%E7%85%A7%E7%89%87%201.jpg"
        );
    }
}
