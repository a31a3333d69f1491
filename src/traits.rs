use async_trait::async_trait;
use tracing::warn;

use crate::error::ScraperError;

#[async_trait]
pub trait Scraper: Send + Sync {
    type Output: Send;

    /// ブラウザ初期化
    async fn initialize(&mut self) -> Result<(), ScraperError>;

    /// ポータル操作と抽出
    async fn scrape(&mut self) -> Result<Self::Output, ScraperError>;

    /// リソース解放
    async fn close(&mut self) -> Result<(), ScraperError>;

    /// 一括実行（initialize → scrape → close）
    ///
    /// scrape が失敗してもブラウザは必ず閉じる。close の失敗はログのみで scrape の結果を返す
    async fn execute(&mut self) -> Result<Self::Output, ScraperError> {
        self.initialize().await?;
        let result = self.scrape().await;
        if let Err(e) = self.close().await {
            warn!("Failed to close scraper: {}", e);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// scrape と close の成否を切り替えられるスクレイパー
    struct StubScraper {
        scrape_ok: bool,
        close_ok: bool,
        closed: bool,
    }

    #[async_trait]
    impl Scraper for StubScraper {
        type Output = &'static str;

        async fn initialize(&mut self) -> Result<(), ScraperError> {
            Ok(())
        }

        async fn scrape(&mut self) -> Result<&'static str, ScraperError> {
            if self.scrape_ok {
                Ok("scraped")
            } else {
                Err(ScraperError::Login("No voter record found".into()))
            }
        }

        async fn close(&mut self) -> Result<(), ScraperError> {
            self.closed = true;
            if self.close_ok {
                Ok(())
            } else {
                Err(ScraperError::BrowserInit("close failed".into()))
            }
        }
    }

    #[tokio::test]
    async fn test_execute_keeps_scrape_error_when_close_fails() {
        let mut scraper = StubScraper {
            scrape_ok: false,
            close_ok: false,
            closed: false,
        };
        let result = scraper.execute().await;
        assert!(scraper.closed);
        assert!(matches!(result, Err(ScraperError::Login(_))));
    }

    #[tokio::test]
    async fn test_execute_returns_output_when_close_fails() {
        let mut scraper = StubScraper {
            scrape_ok: true,
            close_ok: false,
            closed: false,
        };
        assert_eq!(scraper.execute().await.unwrap(), "scraped");
        assert!(scraper.closed);
    }
}
