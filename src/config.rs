use std::time::Duration;

/// 投票ポータルのベースURL
pub const PORTAL_BASE_URL: &str = "https://voterportal.sos.la.gov";

/// ブラウザスクレイパー共通設定
#[derive(Debug, Clone)]
pub struct ScraperConfig {
    pub base_url: String,
    pub headless: bool,
    pub debug: bool,
    pub chrome_path: Option<String>,
    pub timeout: Duration,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            base_url: PORTAL_BASE_URL.to_string(),
            headless: true,
            debug: false,
            chrome_path: None,
            timeout: Duration::from_secs(60),
        }
    }
}

impl ScraperConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_chrome_path(mut self, path: Option<String>) -> Self {
        self.chrome_path = path;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// ポータル上のパスを絶対URLにする
    pub fn portal_url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

/// Firestore 接続設定
#[derive(Debug, Clone, Default)]
pub struct StoreConfig {
    pub project_id: String,
    pub access_token: Option<String>,
    /// 例: "localhost:8080"。設定時は認証なしでエミュレータに接続
    pub emulator_host: Option<String>,
}

impl StoreConfig {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            ..Default::default()
        }
    }

    pub fn with_access_token(mut self, token: Option<String>) -> Self {
        self.access_token = token;
        self
    }

    pub fn with_emulator_host(mut self, host: Option<String>) -> Self {
        self.emulator_host = host;
        self
    }

    /// ドキュメントAPIのルートURL
    pub fn documents_url(&self) -> String {
        let origin = match &self.emulator_host {
            Some(host) => format!("http://{}", host),
            None => "https://firestore.googleapis.com".to_string(),
        };
        format!(
            "{}/v1/projects/{}/databases/(default)/documents",
            origin, self.project_id
        )
    }
}

/// ポーリングサービス設定
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub check_interval: Duration,
    pub heartbeat_interval: Duration,
    pub voter_timeout: Duration,
    pub ballot_timeout: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(60),
            heartbeat_interval: Duration::from_secs(20),
            voter_timeout: Duration::from_secs(120),
            ballot_timeout: Duration::from_secs(180),
        }
    }
}

impl ServiceConfig {
    pub fn with_check_interval(mut self, interval: Duration) -> Self {
        self.check_interval = interval;
        self
    }

    pub fn with_timeouts(mut self, voter: Duration, ballot: Duration) -> Self {
        self.voter_timeout = voter;
        self.ballot_timeout = ballot;
        self
    }
}

/// HTTP API 設定
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

impl ApiConfig {
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
