//! 住民投票案件スクレイパーモジュール
//!
//! 選挙日・パリッシュごとの案件本文を ballot_propositions に保存する

mod job;
mod parse;
mod scraper;
mod types;

pub use job::{save_propositions, scrape_for_user, scrape_parish_for_election};
pub use parse::{
    clean_proposition_text, extract_main_text, extract_proposition_links,
    extract_proposition_title, sanitize_id,
};
pub use self::scraper::BallotScraper;
pub use types::{BallotProposition, PropositionLink, DEFAULT_ELECTION, DEFAULT_PARISH};
