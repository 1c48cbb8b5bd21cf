//! multipart 上传处理器：校验请求头，把请求体流式交给解析器写入目标目录。

use axum::body::Body as AxumBody;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use futures_util::stream::TryStreamExt;
use std::io;
use std::path::Path;
use tokio::fs;
use tokio_util::io::StreamReader;
use tracing::{info, warn};

use crate::error::ApiError;
use crate::html::{encode_href, render_upload_done};
use crate::multipart::{
    MultipartError, boundary_from_content_type, is_multipart_form, parse_and_store,
};
use crate::storage::Storage;

/// 处理 POST 上传；`path` 指向目录时写入该目录，指向文件时写入其所在目录。
pub async fn upload_file(
    storage: &Storage,
    path: &str,
    headers: &HeaderMap,
    body: AxumBody,
) -> Result<Response, ApiError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");
    if !is_multipart_form(content_type) {
        return Err(ApiError::BadRequest("Unsupported content type".into()));
    }
    let boundary =
        boundary_from_content_type(content_type).ok_or(MultipartError::BoundaryNotFound)?;

    let mut destination = storage.resolve_path_checked(path, true).await?;
    if fs::metadata(&destination)
        .await
        .is_ok_and(|metadata| metadata.is_file())
        && let Some(parent) = destination.parent()
    {
        destination = parent.to_path_buf();
    }

    let reader = StreamReader::new(body.into_data_stream().map_err(io::Error::other));
    let stored = match parse_and_store(reader, &boundary, &destination).await {
        Ok(stored) => stored,
        Err(MultipartError::Io(err)) => {
            warn!(path, error = %err, "upload aborted");
            return Err(MultipartError::Io(err).into());
        }
        Err(err) => {
            info!(path, error = %err, "upload rejected");
            return Err(err.into());
        }
    };

    info!(
        file = %stored.target.path().display(),
        bytes = stored.bytes_written,
        "upload stored"
    );
    let back = back_href(storage.root_path(), &stored.target.directory);
    Ok((
        StatusCode::CREATED,
        Html(render_upload_done(&stored.target.filename, &back)),
    )
        .into_response())
}

fn back_href(root: &Path, directory: &Path) -> String {
    let relative = directory
        .strip_prefix(root)
        .map(|rel| {
            rel.components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/")
        })
        .unwrap_or_default();
    encode_href(&relative)
}
