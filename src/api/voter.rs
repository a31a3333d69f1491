//! 有権者照会エンドポイント

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use chrono::{Datelike, Utc};
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{error, info, warn};

use crate::voter::{VoterInfo, VoterQuery};

use super::error::ApiError;
use super::AppState;

pub const REQUIRED_FIELDS: [&str; 5] =
    ["first_name", "last_name", "zip_code", "birth_month", "birth_year"];

/// 一括照会の上限
pub const MAX_BATCH_SIZE: usize = 50;

const MIN_BIRTH_YEAR: i64 = 1900;

/// 一括照会の1件分
#[derive(Debug, Serialize)]
pub struct BatchResult {
    pub uid: Value,
    pub success: bool,
    pub data: Option<VoterInfo>,
    pub error: Option<String>,
}

fn text_field(body: &Map<String, Value>, field: &str) -> String {
    match body.get(field) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

/// 整数または整数表記の文字列
fn int_field(body: &Map<String, Value>, field: &str) -> Option<i64> {
    match body.get(field)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// リクエストボディを検証して照会条件にする
pub fn parse_voter_request(body: &Value) -> Result<VoterQuery, ApiError> {
    let body = body
        .as_object()
        .ok_or_else(|| ApiError::bad_request("Request must be JSON"))?;

    let missing: Vec<&str> = REQUIRED_FIELDS
        .iter()
        .copied()
        .filter(|field| !body.contains_key(*field))
        .collect();
    if !missing.is_empty() {
        return Err(ApiError::bad_request(format!(
            "Missing required fields: {}",
            missing.join(", ")
        )));
    }

    let first_name = text_field(body, "first_name");
    let last_name = text_field(body, "last_name");
    let zip_code = text_field(body, "zip_code");

    let (Some(birth_month), Some(birth_year)) =
        (int_field(body, "birth_month"), int_field(body, "birth_year"))
    else {
        return Err(ApiError::bad_request(
            "birth_month and birth_year must be valid integers",
        ));
    };

    if first_name.is_empty() || last_name.is_empty() {
        return Err(ApiError::bad_request(
            "first_name and last_name cannot be empty",
        ));
    }

    if zip_code.len() != 5 || !zip_code.chars().all(|c| c.is_ascii_digit()) {
        return Err(ApiError::bad_request("zip_code must be a 5-digit number"));
    }

    if !(1..=12).contains(&birth_month) {
        return Err(ApiError::bad_request("birth_month must be between 1 and 12"));
    }

    let current_year = i64::from(Utc::now().year());
    if !(MIN_BIRTH_YEAR..=current_year).contains(&birth_year) {
        return Err(ApiError::bad_request(format!(
            "birth_year must be between {} and {}",
            MIN_BIRTH_YEAR, current_year
        )));
    }

    // 範囲検証済み
    Ok(VoterQuery::new(
        first_name,
        last_name,
        zip_code,
        birth_month as u32,
        birth_year as i32,
    ))
}

/// POST /api/voter-info
pub async fn voter_info(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(body) = payload?;
    let query = parse_voter_request(&body)?;
    info!("Voter info request for: {}", query.redacted());

    match state.lookup.lookup(query).await {
        Ok(voter_info) => {
            let data = serde_json::to_value(&voter_info).map_err(|e| {
                error!("Error processing voter info request: {}", e);
                ApiError::Internal
            })?;
            Ok(Json(json!({ "success": true, "data": data })))
        }
        Err(e) => {
            if e.is_lookup_failure() {
                warn!("Voter lookup failed: {}", e);
            } else {
                error!("Voter lookup error: {}", e);
            }
            Err(ApiError::NotFound(e.to_string()))
        }
    }
}

/// POST /api/batch-voter-info
///
/// 1件ずつ順に照会する。各件の失敗は結果に含め、全体は 200 を返す
pub async fn batch_voter_info(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(body) = payload?;
    let body = body
        .as_object()
        .ok_or_else(|| ApiError::bad_request("Request must be JSON"))?;

    let users = match body.get("users") {
        None => Vec::new(),
        Some(Value::Array(users)) => users.clone(),
        Some(_) => return Err(ApiError::bad_request("users must be an array")),
    };
    if users.len() > MAX_BATCH_SIZE {
        return Err(ApiError::bad_request(format!(
            "Batch size limited to {} users",
            MAX_BATCH_SIZE
        )));
    }
    info!("Batch voter info request for {} users", users.len());

    let mut results = Vec::with_capacity(users.len());
    for user in &users {
        let uid = user.get("uid").cloned().unwrap_or(Value::Null);
        let outcome = match parse_voter_request(user) {
            Ok(query) => state
                .lookup
                .lookup(query)
                .await
                .map_err(|e| e.to_string()),
            Err(e) => Err(e.message().to_string()),
        };

        results.push(match outcome {
            Ok(data) => BatchResult {
                uid,
                success: true,
                data: Some(data),
                error: None,
            },
            Err(error) => {
                warn!("Batch entry {} failed: {}", uid, error);
                BatchResult {
                    uid,
                    success: false,
                    data: None,
                    error: Some(error),
                }
            }
        });
    }

    Ok(Json(json!({ "success": true, "results": results })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_body() -> Value {
        json!({
            "first_name": "Ashtyn",
            "last_name": "Roberts",
            "zip_code": "70817",
            "birth_month": 7,
            "birth_year": 2003
        })
    }

    fn rejection(body: Value) -> String {
        parse_voter_request(&body).unwrap_err().message().to_string()
    }

    #[test]
    fn test_parse_valid_request() {
        let query = parse_voter_request(&valid_body()).unwrap();
        assert_eq!(query, VoterQuery::new("Ashtyn", "Roberts", "70817", 7, 2003));
    }

    #[test]
    fn test_numeric_strings_are_accepted() {
        let mut body = valid_body();
        body["birth_month"] = json!("07");
        body["birth_year"] = json!(" 2003 ");
        body["first_name"] = json!("  Ashtyn ");
        let query = parse_voter_request(&body).unwrap();
        assert_eq!(query.birth_month, 7);
        assert_eq!(query.first_name, "Ashtyn");
    }

    #[test]
    fn test_missing_fields_are_listed_in_order() {
        assert_eq!(
            rejection(json!({ "first_name": "A", "zip_code": "70817" })),
            "Missing required fields: last_name, birth_month, birth_year"
        );
    }

    #[test]
    fn test_validation_messages() {
        let mut body = valid_body();
        body["birth_month"] = json!("July");
        assert_eq!(
            rejection(body),
            "birth_month and birth_year must be valid integers"
        );

        let mut body = valid_body();
        body["last_name"] = json!("   ");
        assert_eq!(rejection(body), "first_name and last_name cannot be empty");

        let mut body = valid_body();
        body["zip_code"] = json!("7081A");
        assert_eq!(rejection(body), "zip_code must be a 5-digit number");

        let mut body = valid_body();
        body["birth_month"] = json!(13);
        assert_eq!(rejection(body), "birth_month must be between 1 and 12");

        let mut body = valid_body();
        body["birth_year"] = json!(1899);
        assert!(rejection(body).starts_with("birth_year must be between 1900 and "));
    }

    #[test]
    fn test_non_object_body() {
        assert_eq!(rejection(json!([1, 2])), "Request must be JSON");
    }
}
