//! 统一的请求错误类型与 HTTP 响应转换。

use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use std::io::ErrorKind;

use crate::config::AUTH_REALM;
use crate::html::render_error_page;
use crate::listing::ListError;
use crate::multipart::MultipartError;
use crate::root::RootError;
use crate::storage::StorageError;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Internal(String),
    RangeNotSatisfiable(u64),
    Unauthorized,
    TooManyRequests(u64),
    MethodNotAllowed,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::RangeNotSatisfiable(_) => StatusCode::RANGE_NOT_SATISFIABLE,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut headers = HeaderMap::new();
        let body = match self {
            ApiError::BadRequest(msg) | ApiError::NotFound(msg) | ApiError::Internal(msg) => {
                render_error_page(status, &msg)
            }
            ApiError::RangeNotSatisfiable(size) => {
                if let Ok(value) = HeaderValue::from_str(&format!("bytes */{size}")) {
                    headers.insert(header::CONTENT_RANGE, value);
                }
                render_error_page(status, "range not satisfiable")
            }
            ApiError::Unauthorized => {
                if let Ok(value) = HeaderValue::from_str(&format!(r#"Basic realm="{AUTH_REALM}""#))
                {
                    headers.insert(header::WWW_AUTHENTICATE, value);
                }
                render_error_page(status, "Authentication required")
            }
            ApiError::TooManyRequests(retry_after) => {
                if retry_after > 0
                    && let Ok(value) = HeaderValue::from_str(&retry_after.to_string())
                {
                    headers.insert(header::RETRY_AFTER, value);
                }
                render_error_page(
                    status,
                    &format!("Too many attempts, retry in {retry_after} seconds"),
                )
            }
            ApiError::MethodNotAllowed => render_error_page(status, "method not allowed"),
        };
        (status, headers, Html(body)).into_response()
    }
}

impl From<StorageError> for ApiError {
    fn from(error: StorageError) -> Self {
        match error {
            StorageError::InvalidPath => ApiError::BadRequest("invalid path".into()),
            StorageError::Io(err) => match err.kind() {
                ErrorKind::NotFound => ApiError::NotFound("Not found".into()),
                _ => ApiError::Internal(err.to_string()),
            },
        }
    }
}

impl From<ListError> for ApiError {
    fn from(error: ListError) -> Self {
        match error {
            ListError::NotFound => ApiError::NotFound("Not found".into()),
            ListError::Unreadable(err) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(error: MultipartError) -> Self {
        match error {
            MultipartError::Io(err) => ApiError::Internal(err.to_string()),
            other => ApiError::BadRequest(other.to_string()),
        }
    }
}

impl From<RootError> for ApiError {
    fn from(error: RootError) -> Self {
        ApiError::BadRequest(format!("Cannot set the directory: {error}"))
    }
}
