//! 有権者ポータル スクレイパー実装
//!
//! ログイン画面 → 結果画面 → 投票所（ElectionDayVoting）画面 の順に遷移する

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::Page;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::browser::{self, BrowserSession};
use crate::config::ScraperConfig;
use crate::error::ScraperError;
use crate::traits::Scraper;

use super::parse::{extract_voter_info, extract_voting_location, find_voter_uid};
use super::types::{VoterInfo, VoterQuery, VotingLocation};

const LOGIN_PATH: &str = "/Home/VoterLogin";
const LOCATION_PATH: &str = "/Voting/Index/ElectionDayVoting";
const ERROR_SCREENSHOT: &str = "error_screenshot.png";
const LOCATION_SCREENSHOT: &str = "voting_location_page.png";

/// フォーム入力欄の論理名
const FORM_FIELDS: [&str; 4] = ["FirstName", "LastName", "ZipCode", "MonthYear"];

pub struct VoterScraper {
    config: ScraperConfig,
    query: VoterQuery,
    browser: Option<BrowserSession>,
    page: Option<Page>,
}

impl VoterScraper {
    pub fn new(config: ScraperConfig, query: VoterQuery) -> Self {
        Self {
            config,
            query,
            browser: None,
            page: None,
        }
    }

    fn get_page(&self) -> Result<&Page, ScraperError> {
        self.page
            .as_ref()
            .ok_or_else(|| ScraperError::BrowserInit("Browser not initialized".into()))
    }

    /// name → id → name部分一致 の順で入力欄を探し、印を付ける
    ///
    /// 見つかった要素には `data-lawgic-field` 属性を付与し、セレクタで再取得できるようにする
    async fn mark_input_field(&self, page: &Page, field: &str) -> Result<bool, ScraperError> {
        let script = format!(
            r#"
            (function() {{
                var field = {name};
                var el = document.querySelector('[name="' + field + '"]')
                    || document.getElementById(field);
                if (!el) {{
                    var inputs = document.querySelectorAll('input');
                    for (var i = 0; i < inputs.length; i++) {{
                        var n = (inputs[i].getAttribute('name') || '');
                        if (n.indexOf(field.toLowerCase()) >= 0) {{ el = inputs[i]; break; }}
                    }}
                }}
                if (!el) return false;
                el.setAttribute('data-lawgic-field', field);
                return true;
            }})()
            "#,
            name = browser::js_string(field)
        );
        browser::eval(page, &script).await
    }

    async fn type_into(&self, page: &Page, field: &str, value: &str) -> Result<(), ScraperError> {
        let selector = format!("[data-lawgic-field='{}']", field);
        page.find_element(&selector)
            .await
            .map_err(|e| ScraperError::ElementNotFound(format!("{}: {}", field, e)))?
            .click()
            .await
            .map_err(|e| ScraperError::Login(format!("focus {}: {}", field, e)))?
            .type_str(value)
            .await
            .map_err(|e| ScraperError::Login(format!("type {}: {}", field, e)))?;
        debug!("Filled {}", field);
        Ok(())
    }

    /// ログインフォームを入力して送信
    async fn login(&self, page: &Page) -> Result<(), ScraperError> {
        let url = self.config.portal_url(LOGIN_PATH);
        info!("Loading {}...", url);
        browser::goto(page, &url).await?;
        sleep(Duration::from_secs(2)).await;

        info!("Filling login form...");
        for field in FORM_FIELDS {
            if !self.mark_input_field(page, field).await? {
                return Err(ScraperError::ElementNotFound(
                    "Could not find all form fields".into(),
                ));
            }
        }

        self.type_into(page, "FirstName", &self.query.first_name.trim().to_uppercase())
            .await?;
        self.type_into(page, "LastName", &self.query.last_name.trim().to_uppercase())
            .await?;
        self.type_into(page, "ZipCode", self.query.zip_code.trim())
            .await?;
        self.type_into(page, "MonthYear", &self.query.birth_date())
            .await?;
        info!("Submitting login for {}", self.query.redacted());

        page.find_element("button[type='submit'], input[type='submit']")
            .await
            .map_err(|e| ScraperError::ElementNotFound(format!("submit button: {}", e)))?
            .click()
            .await
            .map_err(|e| ScraperError::Login(format!("submit click: {}", e)))?;

        sleep(Duration::from_secs(3)).await;
        browser::wait_ready(page).await;

        // 画面上のエラー表示（該当者なし等）
        let alert: String = browser::eval(
            page,
            r#"
            (function() {
                var el = document.querySelector('.alert-danger');
                if (!el) return '';
                var style = window.getComputedStyle(el);
                if (style.display === 'none' || style.visibility === 'hidden') return '';
                return (el.innerText || '').trim();
            })()
            "#,
        )
        .await
        .unwrap_or_default();

        if !alert.is_empty() {
            return Err(ScraperError::Login(alert));
        }
        Ok(())
    }

    /// 結果画面からUIDを探す
    async fn voter_uid(&self, page: &Page) -> Option<String> {
        let url = browser::current_url(page).await;
        let hrefs: Vec<String> = browser::eval(
            page,
            "Array.from(document.querySelectorAll('a')).map(a => a.href).filter(h => !!h)",
        )
        .await
        .unwrap_or_default();
        let source = browser::page_source(page).await.unwrap_or_default();
        find_voter_uid(&url, &hrefs, &source)
    }

    /// ElectionDayVoting 画面から投票所を取得
    async fn voting_location(&self, page: &Page, uid: &str) -> Result<VotingLocation, ScraperError> {
        let url = format!("{}?uid={}", self.config.portal_url(LOCATION_PATH), uid);
        info!("Fetching voting location...");
        browser::goto(page, &url).await?;
        sleep(Duration::from_secs(2)).await;

        let body_text = browser::body_text(page).await?;
        let emphasized: Vec<String> = browser::eval(
            page,
            "Array.from(document.querySelectorAll('strong, b, h1, h2, h3, h4')).map(e => (e.innerText || '').trim())",
        )
        .await
        .unwrap_or_default();

        for (i, line) in body_text.lines().take(30).enumerate() {
            let line = line.trim();
            if !line.is_empty() {
                debug!("Line {}: {}", i, line.chars().take(80).collect::<String>());
            }
        }

        if self.config.debug {
            browser::save_screenshot(page, LOCATION_SCREENSHOT, false).await;
        }

        Ok(extract_voting_location(&body_text, &emphasized))
    }

    async fn scrape_page(&self, page: &Page) -> Result<VoterInfo, ScraperError> {
        self.login(page).await?;

        info!("Extracting voter registration info...");
        let body_text = browser::body_text(page).await?;
        let mut info = extract_voter_info(&body_text);
        if info.is_empty() {
            return Err(ScraperError::Extraction(
                "Could not extract voter information".into(),
            ));
        }

        match self.voter_uid(page).await {
            Some(uid) => {
                debug!("Found voter UID: {}...", uid.chars().take(20).collect::<String>());
                match self.voting_location(page, &uid).await {
                    Ok(location) if !location.is_empty() => {
                        if let Some(address) = &location.address {
                            info!("Found voting location address: {}", address);
                        }
                        if let Some(name) = &location.name {
                            info!("Found voting location name: {}", name);
                        }
                        info.set_location(location);
                    }
                    Ok(_) => warn!("Could not get voting location"),
                    Err(e) => warn!("Voting location lookup failed: {}", e),
                }
            }
            None => warn!("Could not find voter UID - skipping location lookup"),
        }

        Ok(info)
    }
}

#[async_trait]
impl Scraper for VoterScraper {
    type Output = VoterInfo;

    async fn initialize(&mut self) -> Result<(), ScraperError> {
        let (browser, page) = browser::launch(&self.config).await?;
        self.browser = Some(browser);
        self.page = Some(page);
        Ok(())
    }

    async fn scrape(&mut self) -> Result<VoterInfo, ScraperError> {
        let page = self.get_page()?;
        let result = self.scrape_page(page).await;

        if let Err(e) = &result {
            if !e.is_lookup_failure() {
                browser::save_screenshot(page, ERROR_SCREENSHOT, self.config.debug).await;
            }
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
