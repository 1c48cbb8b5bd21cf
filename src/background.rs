//! 后台任务：定期清理已过期的认证失败记录。

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::auth::AuthGate;
use crate::config::RATE_LIMIT_SWEEP_INTERVAL_SECS;

/// 启动后台清理任务，防止只失败过一次的客户端记录无限累积。
pub fn spawn_background_tasks(gate: Arc<AuthGate>) -> JoinHandle<()> {
    spawn_rate_limit_sweep(gate, Duration::from_secs(RATE_LIMIT_SWEEP_INTERVAL_SECS))
}

fn spawn_rate_limit_sweep(gate: Arc<AuthGate>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            let removed = gate.prune_stale().await;
            if removed > 0 {
                debug!(removed, "pruned stale auth failure records");
            }
        }
    })
}
