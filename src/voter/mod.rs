//! 有権者情報スクレイパーモジュール
//!
//! 登録情報（パリッシュ・区・政党・状態）と投票所を取得して users に保存する

mod job;
mod parse;
mod scraper;
mod types;

pub use job::{fetch_and_save, fetch_from_store, query_from_user, save_voter_info, REQUIRED_USER_FIELDS};
pub use parse::{extract_voter_info, extract_voting_location, find_voter_uid};
pub use self::scraper::VoterScraper;
pub use types::{VoterInfo, VoterQuery, VotingLocation};
