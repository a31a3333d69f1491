use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use tower::{Service, ServiceExt};
use tracing::info;

use crate::config::ScraperConfig;
use crate::error::ScraperError;
use crate::traits::Scraper;
use crate::voter::{VoterInfo, VoterQuery, VoterScraper};

/// tower::Serviceを実装した有権者照会サービス
///
/// リクエストごとにブラウザを起動し、照会が終われば閉じる
#[derive(Debug, Clone, Default)]
pub struct VoterInfoService {
    config: ScraperConfig,
}

impl VoterInfoService {
    pub fn new(config: ScraperConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScraperConfig {
        &self.config
    }
}

impl Service<VoterQuery> for VoterInfoService {
    type Response = VoterInfo;
    type Error = ScraperError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: VoterQuery) -> Self::Future {
        info!("Voter lookup request: {}", req.redacted());
        let config = self.config.clone();

        Box::pin(async move {
            let mut scraper = VoterScraper::new(config, req);
            let voter_info = scraper.execute().await?;

            info!(
                "Voter lookup complete: parish={:?}, location={}",
                voter_info.parish,
                voter_info.voting_location_name.is_some()
            );

            Ok(voter_info)
        })
    }
}

/// HTTP ハンドラから使う照会インターフェース
///
/// axum の State は Sync を要求するため、Service そのものではなくこちらを共有する
#[async_trait]
pub trait VoterLookup: Send + Sync {
    async fn lookup(&self, query: VoterQuery) -> Result<VoterInfo, ScraperError>;
}

#[async_trait]
impl VoterLookup for VoterInfoService {
    async fn lookup(&self, query: VoterQuery) -> Result<VoterInfo, ScraperError> {
        self.clone().oneshot(query).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_keeps_config() {
        let config = ScraperConfig::new().with_headless(false).with_debug(true);
        let service = VoterInfoService::new(config);

        assert!(!service.config().headless);
        assert!(service.config().debug);
    }

    #[test]
    fn test_service_is_ready() {
        let mut service = VoterInfoService::default();
        let waker = futures::task::noop_waker();
        let mut cx = Context::from_waker(&waker);

        assert!(matches!(service.poll_ready(&mut cx), Poll::Ready(Ok(()))));
    }
}
