//! スクレイパーライブラリ
//!
//! - ルイジアナ州の投票ポータルから有権者登録情報と投票所を取得
//! - 選挙日・パリッシュごとの住民投票案件本文を取得
//! - users を監視してスクレイパーを自動実行するサービス
//! - 有権者照会 HTTP API
//!
//! # 有権者照会サービス使用例
//!
//! ```rust,ignore
//! use lawgic_scraper::{ScraperConfig, VoterInfoService, VoterQuery};
//! use tower::ServiceExt;
//!
//! #[tokio::main]
//! async fn main() {
//!     let service = VoterInfoService::new(ScraperConfig::new().with_headless(false));
//!
//!     let query = VoterQuery::new("Ashtyn", "Roberts", "70817", 7, 2003);
//!     let info = service.oneshot(query).await.unwrap();
//!     println!("Parish: {:?}", info.parish);
//! }
//! ```
//!
//! # 住民投票案件スクレイパー使用例
//!
//! ```rust,ignore
//! use lawgic_scraper::ballot::BallotScraper;
//! use lawgic_scraper::{Scraper, ScraperConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut scraper = BallotScraper::new(ScraperConfig::new(), "ORLEANS - 36", "11/15/2025");
//!     let propositions = scraper.execute().await.unwrap();
//!     println!("Propositions: {}", propositions.len());
//! }
//! ```

pub mod api;
pub mod ballot;
pub mod browser;
pub mod config;
pub mod error;
pub mod parish;
pub mod poller;
pub mod service;
pub mod signal;
pub mod store;
pub mod summary;
pub mod traits;
pub mod voter;

// 主要な型をリエクスポート
pub use ballot::{BallotProposition, BallotScraper};
pub use config::{ApiConfig, ScraperConfig, ServiceConfig, StoreConfig};
pub use error::ScraperError;
pub use service::{VoterInfoService, VoterLookup};
pub use store::{DocumentStore, FirestoreStore, MemoryStore, StoreError};
pub use traits::Scraper;
pub use voter::{VoterInfo, VoterQuery, VoterScraper};
