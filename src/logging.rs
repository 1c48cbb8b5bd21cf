//! 日志初始化：`RUST_LOG` 优先，否则使用默认过滤规则。

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// 未设置 `RUST_LOG` 时的过滤规则；请求级 span 事件在 debug 级别。
const DEFAULT_FILTER: &str = "info,tower_http=info";

pub fn init_logging() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}
