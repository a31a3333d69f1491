use thiserror::Error;

use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum ScraperError {
    #[error("Browser init error: {0}")]
    BrowserInit(String),

    #[error("Navigation error: {0}")]
    Navigation(String),

    #[error("Login error: {0}")]
    Login(String),

    #[error("JavaScript error: {0}")]
    JavaScript(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("Missing input: {0}")]
    MissingInput(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("File I/O error: {0}")]
    FileIO(#[from] std::io::Error),
}

impl ScraperError {
    /// ポータル側の応答としてユーザーに返してよいエラーか
    ///
    /// ログイン失敗・抽出失敗は「見つからない」扱い、それ以外は内部エラー扱い
    pub fn is_lookup_failure(&self) -> bool {
        matches!(
            self,
            ScraperError::Login(_)
                | ScraperError::Extraction(_)
                | ScraperError::ElementNotFound(_)
                | ScraperError::MissingInput(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_failure_classification() {
        assert!(ScraperError::Login("bad dob".into()).is_lookup_failure());
        assert!(ScraperError::Extraction("empty".into()).is_lookup_failure());
        assert!(!ScraperError::BrowserInit("no chrome".into()).is_lookup_failure());
        assert!(!ScraperError::Timeout("slow".into()).is_lookup_failure());
    }

    #[test]
    fn test_display_keeps_detail() {
        let err = ScraperError::Login("Voter not found".into());
        assert_eq!(err.to_string(), "Login error: Voter not found");
    }
}
