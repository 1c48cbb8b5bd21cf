//! 路由装配：管理路由、路径回退处理器与中间件栈。

use axum::extract::Extension;
use axum::http::Request;
use axum::routing::get;
use axum::{Router, middleware};
use std::sync::Arc;
use tower_http::trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{Level, info_span};

use crate::admin;
use crate::auth::{self, AuthGate};
use crate::config::ADMIN_ROUTE;
use crate::files;
use crate::http::{add_security_headers, client_ip};
use crate::root::RootStore;

pub fn build_router(root: Arc<RootStore>, gate: Arc<AuthGate>) -> Router {
    Router::new()
        .route(
            ADMIN_ROUTE,
            get(admin::set_root_form).post(admin::set_root),
        )
        .route(
            "/set_root/",
            get(admin::set_root_form).post(admin::set_root),
        )
        .fallback(files::serve_path)
        .layer(middleware::from_fn(auth::auth_middleware))
        .layer(middleware::from_fn(add_security_headers))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<_>| {
                    info_span!(
                        env!("CARGO_CRATE_NAME"),
                        client_ip = %client_ip(request),
                        method = ?request.method(),
                        path = ?request.uri().path(),
                    )
                })
                .on_request(DefaultOnRequest::new().level(Level::DEBUG))
                .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
        )
        .layer(Extension(root))
        .layer(Extension(gate))
}
