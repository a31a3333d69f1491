//! 有権者照会の型定義

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::store::{Fields, Value};

/// ポータルのログインフォームに入力する本人情報
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterQuery {
    pub first_name: String,
    pub last_name: String,
    pub zip_code: String,
    pub birth_month: u32,
    pub birth_year: i32,
}

impl VoterQuery {
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        zip_code: impl Into<String>,
        birth_month: u32,
        birth_year: i32,
    ) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            zip_code: zip_code.into(),
            birth_month,
            birth_year,
        }
    }

    /// フォームの MonthYear 欄 ("07/2003")
    pub fn birth_date(&self) -> String {
        format!("{:02}/{}", self.birth_month, self.birth_year)
    }

    /// ログ用（イニシャルとZIPのみ）
    pub fn redacted(&self) -> String {
        let initial = |s: &str| s.trim().chars().next().unwrap_or('?');
        format!(
            "{}. {}., ZIP: {}",
            initial(&self.first_name),
            initial(&self.last_name),
            self.zip_code
        )
    }
}

/// 投票所
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VotingLocation {
    pub name: Option<String>,
    pub address: Option<String>,
}

impl VotingLocation {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.address.is_none()
    }
}

/// 有権者登録情報 + 投票所
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parish: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ward_precinct: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub party: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voting_location_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voting_location_address: Option<String>,
}

impl VoterInfo {
    /// 登録情報が1項目も取れていない
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.parish.is_none()
            && self.ward_precinct.is_none()
            && self.party.is_none()
            && self.status.is_none()
    }

    pub fn set_location(&mut self, location: VotingLocation) {
        self.voting_location_name = location.name;
        self.voting_location_address = location.address;
    }

    /// users ドキュメントへの書き込み内容（取得できた項目 + 更新時刻）
    pub fn to_user_fields(&self) -> Fields {
        let pairs = [
            ("voter_status", &self.status),
            ("voter_parish", &self.parish),
            ("voter_ward_precinct", &self.ward_precinct),
            ("voter_party", &self.party),
            ("voter_full_name", &self.name),
            ("voting_location_name", &self.voting_location_name),
            ("voting_location_address", &self.voting_location_address),
        ];

        let mut fields: Fields = pairs
            .into_iter()
            .filter_map(|(key, value)| {
                value
                    .as_ref()
                    .map(|v| (key.to_string(), Value::from(v.as_str())))
            })
            .collect();
        fields.insert(
            "voter_info_updated_at".to_string(),
            Value::Timestamp(Utc::now()),
        );
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_birth_date_is_zero_padded() {
        let query = VoterQuery::new("Ashtyn", "Roberts", "70817", 7, 2003);
        assert_eq!(query.birth_date(), "07/2003");
        assert_eq!(query.redacted(), "A. R., ZIP: 70817");
    }

    #[test]
    fn test_user_fields_only_include_scraped_values() {
        let info = VoterInfo {
            parish: Some("East Baton Rouge".into()),
            status: Some("Active".into()),
            voting_location_name: Some("WOODLAWN HIGH SCHOOL".into()),
            ..Default::default()
        };

        let fields = info.to_user_fields();
        assert_eq!(fields["voter_parish"], Value::from("East Baton Rouge"));
        assert_eq!(fields["voter_status"], Value::from("Active"));
        assert_eq!(fields["voting_location_name"], Value::from("WOODLAWN HIGH SCHOOL"));
        assert!(!fields.contains_key("voter_party"));
        assert!(!fields.contains_key("voting_location_address"));
        assert!(matches!(fields["voter_info_updated_at"], Value::Timestamp(_)));
    }

    #[test]
    fn test_serialization_skips_missing_fields() {
        let info = VoterInfo {
            name: Some("Ashtyn Elizabeth Roberts".into()),
            ward_precinct: Some("03/016".into()),
            ..Default::default()
        };
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "name": "Ashtyn Elizabeth Roberts", "ward_precinct": "03/016" })
        );
        assert!(!info.is_empty());
        assert!(VoterInfo::default().is_empty());
    }
}
