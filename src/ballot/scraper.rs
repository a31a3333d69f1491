//! 住民投票案件スクレイパー実装
//!
//! PropositionText 画面で選挙とパリッシュを選び、表示された案件リンクを順に取得する

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use chromiumoxide::Page;
use reqwest::Url;
use serde::Deserialize;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::browser::{self, BrowserSession};
use crate::config::ScraperConfig;
use crate::error::ScraperError;
use crate::traits::Scraper;

use super::parse::{extract_main_text, extract_proposition_links, extract_proposition_title};
use super::types::{BallotProposition, PropositionLink};

const PROPOSITION_PATH: &str = "/PropositionText";
const ERROR_SCREENSHOT: &str = "ballot_error_screenshot.png";

/// 案件ページ HTTP 取得のタイムアウト
const FETCH_TIMEOUT: Duration = Duration::from_secs(12);

/// ドロップダウン操作の結果
#[derive(Debug, Default, Deserialize)]
struct DropdownSelection {
    found: bool,
    matched: bool,
    selected: String,
    options: Vec<String>,
}

/// 選挙ドロップダウン: 表示テキスト完全一致、なければ先頭の選択肢
const SELECT_ELECTION_JS: &str = r#"
(function(target) {
    var select = document.getElementById('MainContent_ddlElection')
        || document.querySelector('select');
    if (!select || select.options.length === 0) {
        return {found: false, matched: false, selected: '', options: []};
    }
    var options = Array.from(select.options).map(function(o) { return o.text.trim(); });
    var index = options.indexOf(target);
    var matched = index >= 0;
    if (!matched) index = 0;
    select.selectedIndex = index;
    select.dispatchEvent(new Event('change', {bubbles: true}));
    return {found: true, matched: matched, selected: options[index], options: options};
})
"#;

/// パリッシュドロップダウン: 大文字小文字を無視した完全一致のみ
const SELECT_PARISH_JS: &str = r#"
(function(target) {
    var select = document.getElementById('MainContent_ddlParish')
        || document.querySelectorAll('select')[1];
    if (!select) {
        return {found: false, matched: false, selected: '', options: []};
    }
    var options = Array.from(select.options).map(function(o) { return o.text.trim(); });
    var wanted = target.trim().toUpperCase();
    var index = options.findIndex(function(t) { return t.toUpperCase() === wanted; });
    if (index < 0) {
        return {found: true, matched: false, selected: '', options: options};
    }
    select.selectedIndex = index;
    select.dispatchEvent(new Event('change', {bubbles: true}));
    return {found: true, matched: true, selected: options[index], options: options};
})
"#;

pub struct BallotScraper {
    config: ScraperConfig,
    parish: String,
    election: String,
    http: reqwest::Client,
    browser: Option<BrowserSession>,
    page: Option<Page>,
}

impl BallotScraper {
    /// `parish` はドロップダウン表記（例: `EAST BATON ROUGE - 17`）
    pub fn new(
        config: ScraperConfig,
        parish: impl Into<String>,
        election: impl Into<String>,
    ) -> Self {
        Self {
            config,
            parish: parish.into(),
            election: election.into(),
            http: reqwest::Client::new(),
            browser: None,
            page: None,
        }
    }

    fn get_page(&self) -> Result<&Page, ScraperError> {
        self.page
            .as_ref()
            .ok_or_else(|| ScraperError::BrowserInit("Browser not initialized".into()))
    }

    async fn select_option(
        &self,
        page: &Page,
        script: &str,
        target: &str,
    ) -> Result<DropdownSelection, ScraperError> {
        let call = format!("({})({})", script.trim(), browser::js_string(target));
        browser::eval(page, &call).await
    }

    async fn select_election(&self, page: &Page) -> Result<(), ScraperError> {
        let selection = self
            .select_option(page, SELECT_ELECTION_JS, &self.election)
            .await?;
        if !selection.found {
            return Err(ScraperError::ElementNotFound(
                "Could not locate election select element".into(),
            ));
        }
        if !selection.matched {
            warn!(
                "Election date '{}' not found. Available: {:?}. Using first option: {}",
                self.election, selection.options, selection.selected
            );
        } else {
            debug!("Selected election: {}", selection.selected);
        }
        Ok(())
    }

    /// パリッシュを選ぶ。選択肢に無ければ false
    async fn select_parish(&self, page: &Page) -> Result<bool, ScraperError> {
        let selection = self
            .select_option(page, SELECT_PARISH_JS, &self.parish)
            .await?;
        if !selection.found {
            return Err(ScraperError::ElementNotFound(
                "Could not locate parish select element".into(),
            ));
        }
        if !selection.matched {
            warn!("Parish '{}' not found", self.parish);
            debug!("Available parishes: {:?}", selection.options);
            return Ok(false);
        }
        debug!("Selected parish: {}", selection.selected);
        Ok(true)
    }

    async fn fetch_http(&self, url: &str) -> Result<String, ScraperError> {
        let html = self
            .http
            .get(url)
            .timeout(FETCH_TIMEOUT)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(html)
    }

    /// HTTP で取得し、失敗したらブラウザで開く
    async fn fetch_html(&self, page: &Page, url: &str) -> Result<String, ScraperError> {
        match self.fetch_http(url).await {
            Ok(html) => Ok(html),
            Err(e) => {
                warn!("HTTP fetch failed ({}), using browser for this page", e);
                browser::goto(page, url).await?;
                sleep(Duration::from_millis(800)).await;
                browser::page_source(page).await
            }
        }
    }

    async fn scrape_link(
        &self,
        page: &Page,
        base: &Url,
        link: &PropositionLink,
    ) -> Result<BallotProposition, ScraperError> {
        let url = base
            .join(&link.href)
            .map_err(|e| ScraperError::Navigation(format!("{}: {}", link.href, e)))?
            .to_string();
        info!(
            "Fetching: {}...",
            link.text.chars().take(60).collect::<String>()
        );

        let html = self.fetch_html(page, &url).await?;
        let full_text = extract_main_text(&html);
        let title = extract_proposition_title(&html, &link.text);
        info!("  Title: {}", title);
        debug!("  Text length: {} chars", full_text.chars().count());

        Ok(BallotProposition {
            title,
            full_text,
            full_text_url: url,
            parish: self.parish.clone(),
            election_date: self.election.clone(),
            source: self.config.portal_url(PROPOSITION_PATH),
            scraped_at: Utc::now(),
        })
    }

    async fn scrape_page(&self, page: &Page) -> Result<Vec<BallotProposition>, ScraperError> {
        let list_url = self.config.portal_url(PROPOSITION_PATH);
        info!(
            "Scraping propositions for {} / election {}",
            self.parish, self.election
        );
        browser::goto(page, &list_url).await?;
        sleep(Duration::from_secs(1)).await;

        self.select_election(page).await?;
        sleep(Duration::from_millis(800)).await;
        browser::wait_ready(page).await;

        if !self.select_parish(page).await? {
            return Ok(Vec::new());
        }
        sleep(Duration::from_millis(1200)).await;
        browser::wait_ready(page).await;

        let list_html = browser::page_source(page).await?;
        let links = extract_proposition_links(&list_html);
        info!("Found {} proposition links", links.len());

        let base = Url::parse(&list_url)
            .map_err(|e| ScraperError::Navigation(format!("{}: {}", list_url, e)))?;

        let mut propositions = Vec::with_capacity(links.len());
        for link in &links {
            match self.scrape_link(page, &base, link).await {
                Ok(proposition) => propositions.push(proposition),
                Err(e) => warn!("Skipping '{}': {}", link.text, e),
            }
        }
        Ok(propositions)
    }
}

#[async_trait]
impl Scraper for BallotScraper {
    type Output = Vec<BallotProposition>;

    async fn initialize(&mut self) -> Result<(), ScraperError> {
        let (browser, page) = browser::launch(&self.config).await?;
        self.browser = Some(browser);
        self.page = Some(page);
        Ok(())
    }

    async fn scrape(&mut self) -> Result<Vec<BallotProposition>, ScraperError> {
        let page = self.get_page()?;
        let result = self.scrape_page(page).await;

        if result.is_err() {
            browser::save_screenshot(page, ERROR_SCREENSHOT, self.config.debug).await;
        }
        result
    }

    async fn close(&mut self) -> Result<(), ScraperError> {
        info!("Closing browser...");
        self.page = None;
        if let Some(browser) = self.browser.take() {
            browser::shutdown(browser).await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ballot_scraper_new() {
        let scraper = BallotScraper::new(ScraperConfig::default(), "ORLEANS - 36", "11/15/2025");
        assert_eq!(scraper.parish, "ORLEANS - 36");
        assert_eq!(scraper.election, "11/15/2025");
        assert!(matches!(
            scraper.get_page(),
            Err(ScraperError::BrowserInit(_))
        ));
    }

    #[test]
    fn test_dropdown_selection_deserialize() {
        let raw = serde_json::json!({
            "found": true,
            "matched": false,
            "selected": "12/06/2025",
            "options": ["12/06/2025", "11/15/2025 "]
        });
        let selection: DropdownSelection = serde_json::from_value(raw).unwrap();
        assert!(selection.found);
        assert!(!selection.matched);
        assert_eq!(selection.options.len(), 2);
    }

    #[test]
    fn test_relative_links_resolve_against_portal() {
        let base = Url::parse(&ScraperConfig::default().portal_url(PROPOSITION_PATH)).unwrap();
        assert_eq!(
            base.join("/PropositionText/Detail?id=7").unwrap().as_str(),
            "https://voterportal.sos.la.gov/PropositionText/Detail?id=7"
        );
        assert_eq!(
            base.join("https://example.org/a").unwrap().as_str(),
            "https://example.org/a"
        );
    }

    #[tokio::test]
    #[ignore] // 実環境テスト用: cargo test test_ballot_scraper_live -- --ignored --nocapture
    async fn test_ballot_scraper_live() {
        let mut scraper = BallotScraper::new(
            ScraperConfig::default(),
            super::super::types::DEFAULT_PARISH,
            super::super::types::DEFAULT_ELECTION,
        );
        let propositions = scraper.execute().await.expect("scrape failed");
        for p in &propositions {
            println!("{} ({} chars)", p.title, p.full_text.len());
        }
    }
}
