//! 終了シグナル

use tracing::warn;

/// Ctrl+C を待つ
///
/// ハンドラを登録できなかった場合はログを出して戻らない
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to install Ctrl+C handler: {}", e);
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_shutdown_signal_waits_without_ctrl_c() {
        let waited = tokio::time::timeout(Duration::from_millis(100), shutdown_signal()).await;
        assert!(waited.is_err());
    }
}
