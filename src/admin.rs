//! 根目录管理页面与切换接口。

use axum::extract::rejection::FormRejection;
use axum::extract::{Extension, Form};
use axum::response::Html;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::ApiError;
use crate::html::{render_admin_page, render_root_changed};
use crate::root::{RootError, RootStore};

#[derive(Deserialize)]
pub(crate) struct SetRootForm {
    new_root: Option<String>,
}

/// 显示当前根目录与切换表单。
pub async fn set_root_form(Extension(root): Extension<Arc<RootStore>>) -> Html<String> {
    Html(render_admin_page(&root.get_root().to_string_lossy()))
}

/// 切换根目录；成功后的请求都在新根目录下解析。
pub async fn set_root(
    Extension(root): Extension<Arc<RootStore>>,
    form: Result<Form<SetRootForm>, FormRejection>,
) -> Result<Html<String>, ApiError> {
    let new_root = form
        .ok()
        .and_then(|Form(form)| form.new_root)
        .filter(|value| !value.trim().is_empty())
        .ok_or(RootError::EmptyInput)?;

    match root.set_root(&new_root).await {
        Ok(resolved) => {
            info!(root = %resolved.display(), "root directory set");
            Ok(Html(render_root_changed(&resolved.to_string_lossy())))
        }
        Err(err) => {
            warn!(input = %new_root, error = %err, "cannot set root directory");
            Err(err.into())
        }
    }
}
