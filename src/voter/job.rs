//! 有権者情報の取得とストアへの保存

use tracing::{error, info};

use crate::config::ScraperConfig;
use crate::error::ScraperError;
use crate::store::{Document, DocumentStore, USERS};
use crate::traits::Scraper;

use super::scraper::VoterScraper;
use super::types::{VoterInfo, VoterQuery};

/// users ドキュメントに必要な入力項目
pub const REQUIRED_USER_FIELDS: [&str; 5] =
    ["first_name", "last_name", "zip_code", "birth_month", "birth_year"];

/// ユーザードキュメントから照会条件を組み立てる
pub fn query_from_user(user: &Document) -> Result<VoterQuery, ScraperError> {
    let missing: Vec<&str> = REQUIRED_USER_FIELDS
        .iter()
        .copied()
        .filter(|field| !user.has(field))
        .collect();
    if !missing.is_empty() {
        return Err(ScraperError::MissingInput(format!(
            "User is missing required fields: {}",
            missing.join(", ")
        )));
    }

    let text = |field: &str| -> Result<String, ScraperError> {
        let value = user.get(field).ok_or_else(|| {
            ScraperError::MissingInput(format!("{} is missing", field))
        })?;
        match (value.as_str(), value.as_i64()) {
            (Some(s), _) => Ok(s.to_string()),
            (None, Some(n)) => Ok(n.to_string()),
            _ => Err(ScraperError::MissingInput(format!("{} must be text", field))),
        }
    };
    let number = |field: &str| -> Result<i64, ScraperError> {
        user.get_i64(field)
            .ok_or_else(|| ScraperError::MissingInput(format!("{} must be an integer", field)))
    };

    let birth_month = u32::try_from(number("birth_month")?)
        .map_err(|_| ScraperError::MissingInput("birth_month out of range".into()))?;
    let birth_year = i32::try_from(number("birth_year")?)
        .map_err(|_| ScraperError::MissingInput("birth_year out of range".into()))?;

    Ok(VoterQuery::new(
        text("first_name")?,
        text("last_name")?,
        text("zip_code")?,
        birth_month,
        birth_year,
    ))
}

/// ポータルから取得して users/{uid} を更新
pub async fn fetch_and_save(
    store: &dyn DocumentStore,
    config: &ScraperConfig,
    user_id: &str,
    query: VoterQuery,
) -> Result<VoterInfo, ScraperError> {
    info!("Fetching voter information for user {}", user_id);

    let mut scraper = VoterScraper::new(config.clone(), query);
    let info = scraper.execute().await?;
    save_voter_info(store, user_id, &info).await?;

    Ok(info)
}

/// 取得結果を users/{uid} にマージ
pub async fn save_voter_info(
    store: &dyn DocumentStore,
    user_id: &str,
    info: &VoterInfo,
) -> Result<(), ScraperError> {
    let update = info.to_user_fields();
    store.update(USERS, user_id, update).await.map_err(|e| {
        error!("Error updating user {}: {}", user_id, e);
        e
    })?;

    info!(
        "Saved voter info for {}: parish={:?}, ward={:?}, location={:?}",
        user_id, info.parish, info.ward_precinct, info.voting_location_name
    );
    Ok(())
}

/// users/{uid} の入力項目を読み、取得と保存を行う
pub async fn fetch_from_store(
    store: &dyn DocumentStore,
    config: &ScraperConfig,
    user_id: &str,
) -> Result<VoterInfo, ScraperError> {
    info!("Reading user data for: {}", user_id);

    let user = store
        .get(USERS, user_id)
        .await?
        .ok_or_else(|| ScraperError::MissingInput(format!("User document not found: {}", user_id)))?;

    let query = query_from_user(&user)?;
    fetch_and_save(store, config, user_id, query).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{fields, MemoryStore, Value};

    #[test]
    fn test_query_from_user() {
        let user = Document::new(
            "u1",
            fields([
                ("first_name", Value::from("Ashtyn")),
                ("last_name", Value::from("Roberts")),
                ("zip_code", Value::from(70817)),
                ("birth_month", Value::from("7")),
                ("birth_year", Value::from(2003)),
            ]),
        );

        let query = query_from_user(&user).unwrap();
        assert_eq!(query, VoterQuery::new("Ashtyn", "Roberts", "70817", 7, 2003));
    }

    #[test]
    fn test_query_from_user_reports_missing_fields() {
        let user = Document::new("u1", fields([("first_name", "Ashtyn"), ("zip_code", "70817")]));

        let err = query_from_user(&user).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Missing input: User is missing required fields: last_name, birth_month, birth_year"
        );
    }

    #[tokio::test]
    async fn test_save_voter_info_merges_into_user() {
        let store = MemoryStore::new();
        store
            .set(USERS, "u1", fields([("first_name", "Ashtyn"), ("zip_code", "70817")]))
            .await
            .unwrap();

        let info = VoterInfo {
            parish: Some("East Baton Rouge".into()),
            ward_precinct: Some("03/016".into()),
            ..Default::default()
        };
        save_voter_info(&store, "u1", &info).await.unwrap();

        let user = store.get(USERS, "u1").await.unwrap().unwrap();
        assert_eq!(user.get_str("first_name"), Some("Ashtyn"));
        assert_eq!(user.get_str("voter_parish"), Some("East Baton Rouge"));
        assert_eq!(user.get_str("voter_ward_precinct"), Some("03/016"));
        assert!(user.has("voter_info_updated_at"));
    }

    #[tokio::test]
    async fn test_fetch_from_store_unknown_user() {
        let store = MemoryStore::new();
        let err = fetch_from_store(&store, &ScraperConfig::default(), "ghost")
            .await
            .unwrap_err();
        assert!(matches!(err, ScraperError::MissingInput(_)));
    }
}
