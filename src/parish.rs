//! ルイジアナ州パリッシュ（郡相当）コード表と voter_parish の正規化

use tracing::{info, warn};

use crate::store::{fields, DocumentStore, StoreError, USERS};

/// パリッシュ名とSOSコード（ドロップダウン表記 "NAME - 01" の番号）
pub const PARISH_CODES: [(&str, &str); 64] = [
    ("ACADIA", "01"),
    ("ALLEN", "02"),
    ("ASCENSION", "03"),
    ("ASSUMPTION", "04"),
    ("AVOYELLES", "05"),
    ("BEAUREGARD", "06"),
    ("BIENVILLE", "07"),
    ("BOSSIER", "08"),
    ("CADDO", "09"),
    ("CALCASIEU", "10"),
    ("CALDWELL", "11"),
    ("CAMERON", "12"),
    ("CATAHOULA", "13"),
    ("CLAIBORNE", "14"),
    ("CONCORDIA", "15"),
    ("DE SOTO", "16"),
    ("EAST BATON ROUGE", "17"),
    ("EAST CARROLL", "18"),
    ("EAST FELICIANA", "19"),
    ("EVANGELINE", "20"),
    ("FRANKLIN", "21"),
    ("GRANT", "22"),
    ("IBERIA", "23"),
    ("IBERVILLE", "24"),
    ("JACKSON", "25"),
    ("JEFFERSON", "26"),
    ("JEFFERSON DAVIS", "27"),
    ("LAFAYETTE", "28"),
    ("LAFOURCHE", "29"),
    ("LA SALLE", "30"),
    ("LINCOLN", "31"),
    ("LIVINGSTON", "32"),
    ("MADISON", "33"),
    ("MOREHOUSE", "34"),
    ("NATCHITOCHES", "35"),
    ("ORLEANS", "36"),
    ("OUACHITA", "37"),
    ("PLAQUEMINES", "38"),
    ("POINTE COUPEE", "39"),
    ("RAPIDES", "40"),
    ("RED RIVER", "41"),
    ("RICHLAND", "42"),
    ("SABINE", "43"),
    ("ST. BERNARD", "44"),
    ("ST. CHARLES", "45"),
    ("ST. HELENA", "46"),
    ("ST. JAMES", "47"),
    ("ST. JOHN THE BAPTIST", "48"),
    ("ST. LANDRY", "49"),
    ("ST. MARTIN", "50"),
    ("ST. MARY", "51"),
    ("ST. TAMMANY", "52"),
    ("TANGIPAHOA", "53"),
    ("TENSAS", "54"),
    ("TERREBONNE", "55"),
    ("UNION", "56"),
    ("VERMILION", "57"),
    ("VERNON", "58"),
    ("WASHINGTON", "59"),
    ("WEBSTER", "60"),
    ("WEST BATON ROUGE", "61"),
    ("WEST CARROLL", "62"),
    ("WEST FELICIANA", "63"),
    ("WINN", "64"),
];

const LABEL_SEPARATOR: &str = " - ";

/// パリッシュ名からコード（大文字小文字・前後空白は無視）
pub fn parish_code(name: &str) -> Option<&'static str> {
    let key = name.trim().to_uppercase();
    PARISH_CODES
        .iter()
        .find(|(parish, _)| *parish == key)
        .map(|(_, code)| *code)
}

/// コードからパリッシュ名
pub fn parish_name(code: &str) -> Option<&'static str> {
    let code = code.trim();
    PARISH_CODES
        .iter()
        .find(|(_, c)| *c == code)
        .map(|(parish, _)| *parish)
}

/// ドロップダウン表記 ("EAST BATON ROUGE - 17") に変換
///
/// 既に " - " を含む値はそのまま返す
pub fn format_parish(name: &str) -> Option<String> {
    if name.contains(LABEL_SEPARATOR) {
        return Some(name.to_string());
    }
    let code = parish_code(name)?;
    Some(format!("{}{}{}", name.trim().to_uppercase(), LABEL_SEPARATOR, code))
}

/// ドロップダウン照合用の表記。不明なパリッシュは入力のまま
pub fn dropdown_label(name: &str) -> String {
    format_parish(name).unwrap_or_else(|| {
        warn!("Parish code not found for: {}, using as-is", name);
        name.to_string()
    })
}

/// fix_user_parish の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParishFix {
    Updated { from: String, to: String },
    AlreadyFormatted(String),
    UnknownParish(String),
    MissingParish,
    UserNotFound,
}

impl ParishFix {
    /// voter_parish が正しい表記になっている
    pub fn is_ok(&self) -> bool {
        matches!(self, ParishFix::Updated { .. } | ParishFix::AlreadyFormatted(_))
    }
}

/// ユーザーの voter_parish をドロップダウン表記に直す
pub async fn fix_user_parish(
    store: &dyn DocumentStore,
    user_id: &str,
) -> Result<ParishFix, StoreError> {
    let Some(user) = store.get(USERS, user_id).await? else {
        warn!("User not found: {}", user_id);
        return Ok(ParishFix::UserNotFound);
    };

    let Some(current) = user.get_str("voter_parish").filter(|p| !p.is_empty()) else {
        warn!("User {} has no voter_parish field", user_id);
        return Ok(ParishFix::MissingParish);
    };

    let Some(formatted) = format_parish(current) else {
        warn!("No code found for parish: {}", current);
        return Ok(ParishFix::UnknownParish(current.to_string()));
    };

    if formatted == current {
        info!("Parish already in correct format: {}", formatted);
        return Ok(ParishFix::AlreadyFormatted(formatted));
    }

    store
        .update(USERS, user_id, fields([("voter_parish", formatted.as_str())]))
        .await?;
    info!("Fixed parish format for {}: {} -> {}", user_id, current, formatted);

    Ok(ParishFix::Updated {
        from: current.to_string(),
        to: formatted,
    })
}

/// 全ユーザーの voter_parish を修正。(確認件数, 更新件数) を返す
pub async fn fix_all_users(store: &dyn DocumentStore) -> Result<(usize, usize), StoreError> {
    let users = store.list(USERS).await?;
    let checked = users.len();
    let mut updated = 0;

    for user in users {
        let Some(current) = user.get_str("voter_parish") else {
            continue;
        };
        let Some(formatted) = format_parish(current) else {
            continue;
        };
        if formatted != current {
            info!("Updating {}: {} -> {}", user.id, current, formatted);
            store
                .update(USERS, &user.id, fields([("voter_parish", formatted.as_str())]))
                .await?;
            updated += 1;
        }
    }

    info!("Checked {} users, updated {}", checked, updated);
    Ok((checked, updated))
}
