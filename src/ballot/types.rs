//! 住民投票案件の型定義

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::{fields, Fields, Value};

use super::parse::sanitize_id;

/// 既定の選挙日（ドロップダウン表記）
pub const DEFAULT_ELECTION: &str = "11/15/2025";

/// 既定のパリッシュ（ユーザー指定なしで実行したとき）
pub const DEFAULT_PARISH: &str = "EAST BATON ROUGE - 17";

/// 住民投票案件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BallotProposition {
    pub title: String,
    pub full_text: String,
    pub full_text_url: String,
    pub parish: String,
    pub election_date: String,
    pub source: String,
    pub scraped_at: DateTime<Utc>,
}

impl BallotProposition {
    /// パリッシュ + 選挙日 + タイトル から決まるドキュメントID
    pub fn document_id(&self) -> String {
        sanitize_id(&format!(
            "{}_{}_{}",
            self.parish, self.election_date, self.title
        ))
    }

    pub fn to_fields(&self) -> Fields {
        fields([
            ("title", Value::from(self.title.as_str())),
            ("full_text", Value::from(self.full_text.as_str())),
            ("full_text_url", Value::from(self.full_text_url.as_str())),
            ("parish", Value::from(self.parish.as_str())),
            ("election_date", Value::from(self.election_date.as_str())),
            ("source", Value::from(self.source.as_str())),
            ("scraped_at", Value::Timestamp(self.scraped_at)),
        ])
    }
}

/// 案件一覧のリンク
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PropositionLink {
    pub text: String,
    pub href: String,
}
