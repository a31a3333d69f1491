//! Chromium 起動とページ操作の共通処理

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::ScraperConfig;
use crate::error::ScraperError;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// ブラウザ1つ分の一時ユーザーデータディレクトリ
///
/// ディレクトリ自体は Chrome が起動時に作成する
#[derive(Debug)]
pub struct ProfileDir {
    path: PathBuf,
}

impl ProfileDir {
    /// `$TMPDIR/lawgic-<pid>-<nanos>-<seq>` を割り当てる
    pub fn unique() -> Self {
        static SEQ: AtomicU64 = AtomicU64::new(0);
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let name = format!(
            "lawgic-{}-{}-{}",
            std::process::id(),
            nanos,
            SEQ.fetch_add(1, Ordering::Relaxed)
        );
        Self {
            path: std::env::temp_dir().join(name),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// ディレクトリを削除。失敗はログのみ
    pub async fn remove(self) {
        match tokio::fs::remove_dir_all(&self.path).await {
            Ok(()) => debug!("Removed browser profile {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => debug!(
                "Failed to remove browser profile {}: {}",
                self.path.display(),
                e
            ),
        }
    }
}

/// 起動中のブラウザとそのプロファイル
pub struct BrowserSession {
    browser: Browser,
    profile: ProfileDir,
}

/// ブラウザを起動し、空ページを1枚開く
///
/// 起動に失敗した場合もプロファイルは削除する
pub async fn launch(config: &ScraperConfig) -> Result<(BrowserSession, Page), ScraperError> {
    let profile = ProfileDir::unique();
    match start(config, profile.path()).await {
        Ok((browser, page)) => Ok((BrowserSession { browser, profile }, page)),
        Err(e) => {
            profile.remove().await;
            Err(e)
        }
    }
}

async fn start(
    config: &ScraperConfig,
    user_data_dir: &Path,
) -> Result<(Browser, Page), ScraperError> {
    info!("Launching browser (headless={})...", config.headless);

    let mut builder = BrowserConfig::builder()
        .user_data_dir(user_data_dir)
        .window_size(1920, 1080)
        .request_timeout(config.timeout);

    if let Some(path) = &config.chrome_path {
        builder = builder.chrome_executable(path);
    }

    if !config.headless {
        builder = builder.with_head();
    }

    builder = builder
        .no_sandbox()
        .arg("--disable-blink-features=AutomationControlled")
        .arg("--disable-dev-shm-usage")
        .arg("--disable-gpu")
        .arg(format!("--user-agent={}", USER_AGENT));

    if config.debug {
        builder = builder.arg("--enable-logging=stderr").arg("--v=1");
    }

    let browser_config = builder
        .build()
        .map_err(|e| ScraperError::BrowserInit(format!("browser config: {}", e)))?;

    let (browser, mut handler) = Browser::launch(browser_config)
        .await
        .map_err(|e| ScraperError::BrowserInit(e.to_string()))?;

    // ブラウザイベントハンドラをバックグラウンドで実行
    tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            debug!("Browser event: {:?}", event);
        }
    });

    let page = match browser.new_page("about:blank").await {
        Ok(page) => page,
        Err(e) => {
            close_browser(browser).await;
            return Err(ScraperError::BrowserInit(e.to_string()));
        }
    };

    // navigator.webdriver を隠す
    if let Err(e) = page
        .evaluate_on_new_document(
            "Object.defineProperty(navigator, 'webdriver', {get: () => undefined})",
        )
        .await
    {
        debug!("Failed to hide webdriver flag: {}", e);
    }

    info!("Browser launched");
    Ok((browser, page))
}

/// JavaScript を評価して値を取り出す
pub async fn eval<T: DeserializeOwned>(page: &Page, script: &str) -> Result<T, ScraperError> {
    page.evaluate(script)
        .await
        .map_err(|e| ScraperError::JavaScript(e.to_string()))?
        .into_value::<T>()
        .map_err(|e| ScraperError::JavaScript(format!("unexpected result: {}", e)))
}

/// URL に遷移して読み込み完了を待つ
pub async fn goto(page: &Page, url: &str) -> Result<(), ScraperError> {
    debug!("Navigating to {}", url);
    page.goto(url)
        .await
        .map_err(|e| ScraperError::Navigation(format!("{}: {}", url, e)))?;
    wait_ready(page).await;
    Ok(())
}

/// document.readyState が complete になるまで最大30秒待機
pub async fn wait_ready(page: &Page) {
    for i in 0..30 {
        let state: String = eval(page, "document.readyState").await.unwrap_or_default();
        if state == "complete" {
            debug!("Page load complete after {}s", i);
            return;
        }
        if i % 5 == 0 {
            debug!("Waiting for page load... ({}/30) state={}", i + 1, state);
        }
        sleep(Duration::from_secs(1)).await;
    }
    warn!("Page load did not complete within 30s, proceeding anyway");
}

/// 描画済みテキスト（Selenium の body.text 相当）
pub async fn body_text(page: &Page) -> Result<String, ScraperError> {
    eval(page, "document.body ? document.body.innerText : ''").await
}

/// 現在のHTML全体
pub async fn page_source(page: &Page) -> Result<String, ScraperError> {
    page.content()
        .await
        .map_err(|e| ScraperError::JavaScript(e.to_string()))
}

/// 現在のURL
pub async fn current_url(page: &Page) -> String {
    eval(page, "window.location.href").await.unwrap_or_default()
}

/// JS 文字列リテラルとして埋め込めるようにエスケープ
pub fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

/// デバッグ用スクリーンショット。失敗はログのみ
pub async fn save_screenshot(page: &Page, path: impl AsRef<Path>, log_inline: bool) {
    let path = path.as_ref();
    match page
        .screenshot(ScreenshotParams::builder().full_page(true).build())
        .await
    {
        Ok(png) => {
            if log_inline {
                use base64::Engine;
                let encoded = base64::engine::general_purpose::STANDARD.encode(&png);
                debug!("Screenshot: data:image/png;base64,{}", encoded);
            }
            match tokio::fs::write(path, &png).await {
                Ok(()) => info!("Saved screenshot: {}", path.display()),
                Err(e) => warn!("Failed to write screenshot {}: {}", path.display(), e),
            }
        }
        Err(e) => warn!("Failed to capture screenshot: {}", e),
    }
}

/// ブラウザを閉じてプロファイルを削除する。失敗はログのみ
pub async fn shutdown(session: BrowserSession) {
    close_browser(session.browser).await;
    session.profile.remove().await;
}

async fn close_browser(mut browser: Browser) {
    if let Err(e) = browser.close().await {
        debug!("Failed to close browser: {}", e);
    }
    if let Err(e) = browser.wait().await {
        debug!("Failed to wait for browser exit: {}", e);
    }
}
