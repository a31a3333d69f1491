//! ポータル画面テキストからの抽出ヒューリスティック
//!
//! ブラウザに依存しない純粋関数のみ。画面の描画テキスト（innerText）を入力とする。

use once_cell::sync::Lazy;
use regex::Regex;

use super::types::{VoterInfo, VotingLocation};

static NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Name[:\s]+([A-Z][a-z]+(?:[ \t]+[A-Z][a-z]+)*)").unwrap());
static PARISH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Parish[:\s]+([A-Za-z\s]+?)(?:\s+Ward|Status|Party|Quick)").unwrap()
});
static WARD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"Ward/Precinct[:\s]+(\d+/\d+)").unwrap());
static STATUS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Status[:\s]+(Active|Inactive)").unwrap());
static PARTY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Party[:\s]+([A-Za-z\s]+?)(?:\s+Parish|Status|Ward|Quick)").unwrap()
});
static UID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"uid=([a-f0-9\-]+)").unwrap());
static ADDRESS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?im)(\d+[ \t]+[A-Z \t]+(?:RD|ROAD|ST|STREET|AVE|AVENUE|BLVD|BOULEVARD|DR|DRIVE|LN|LANE|WAY|BEND)\b)\s*\n?\s*([A-Z \t]+,\s*LA\s+\d{5})",
    )
    .unwrap()
});

fn capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// 結果画面から登録情報を抽出
pub fn extract_voter_info(body_text: &str) -> VoterInfo {
    VoterInfo {
        name: capture(&NAME_RE, body_text),
        parish: capture(&PARISH_RE, body_text),
        ward_precinct: capture(&WARD_RE, body_text),
        status: capture(&STATUS_RE, body_text),
        party: capture(&PARTY_RE, body_text),
        ..Default::default()
    }
}

/// 有権者UIDを探す（URL → ElectionDayVoting リンク → その他リンク → ページソース）
pub fn find_voter_uid(current_url: &str, hrefs: &[String], page_source: &str) -> Option<String> {
    if let Some(uid) = capture(&UID_RE, current_url) {
        return Some(uid);
    }

    let voting_links = hrefs.iter().filter(|h| h.contains("ElectionDayVoting"));
    let other_links = hrefs.iter().filter(|h| !h.contains("ElectionDayVoting"));
    if let Some(uid) = voting_links
        .chain(other_links)
        .find_map(|href| capture(&UID_RE, href))
    {
        return Some(uid);
    }

    capture(&UID_RE, page_source)
}

/// Python の str.isupper 相当（大小文字のある文字が1つ以上あり、全て大文字）
fn is_all_caps(text: &str) -> bool {
    text.chars().any(char::is_uppercase) && !text.chars().any(char::is_lowercase)
}

fn is_heading_noise(line: &str) -> bool {
    line.contains("ELECTION DAY VOTING")
        || (line.contains("POLLING") && (line.contains("OPEN") || line.contains("HOUR")))
}

/// 投票所ページから名称と住所を抽出
///
/// `emphasized` は strong/b/h1-h4 のテキスト（名称のフォールバック用）
pub fn extract_voting_location(body_text: &str, emphasized: &[String]) -> VotingLocation {
    let mut location = VotingLocation::default();
    let lines: Vec<&str> = body_text.lines().map(str::trim).collect();

    // 全て大文字の名称行 + 数字で始まる住所行
    for (i, line) in lines.iter().enumerate() {
        if !is_all_caps(line) || line.chars().count() <= 5 || is_heading_noise(line) {
            continue;
        }
        let Some(next_line) = lines.get(i + 1) else {
            continue;
        };
        if !next_line.starts_with(|c: char| c.is_ascii_digit()) {
            continue;
        }

        let mut address = next_line.to_string();
        if let Some(city_line) = lines.get(i + 2) {
            if city_line.contains(',')
                && (city_line.contains("LA") || city_line.contains("Louisiana"))
            {
                address = format!("{}, {}", address, city_line);
            }
        }
        location.name = Some(line.to_string());
        location.address = Some(address);
        break;
    }

    // 住所パターンでのフォールバック
    if location.address.is_none() {
        if let Some(caps) = ADDRESS_RE.captures(body_text) {
            let street = caps[1].trim();
            let city_state_zip = caps[2].trim();
            location.address = Some(format!("{}, {}", street, city_state_zip));
        }
    }

    // 強調テキストからの名称フォールバック
    if location.name.is_none() {
        location.name = emphasized
            .iter()
            .map(|t| t.trim())
            .find(|text| {
                let len = text.chars().count();
                is_all_caps(text)
                    && len > 5
                    && len < 100
                    && !text.contains("ELECTION")
                    && !text.contains("POLLING PLACES")
                    && !text.contains("VOTING")
            })
            .map(str::to_string);
    }

    location
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESULTS_PAGE: &str = "Louisiana Secretary of State\n\
        Voter Information\n\
        Name: Ashtyn Elizabeth Roberts\n\
        Parish: East Baton Rouge\n\
        Ward/Precinct: 03/016\n\
        Status: Active\n\
        Party: No Party\n\
        Quick Links\n\
        Election Day Voting";

    const LOCATION_PAGE: &str = "Election Day Voting\n\
        ELECTION DAY VOTING\n\
        Your polling place for Saturday, November 15, 2025\n\
        POLLING PLACES ARE OPEN FROM 7:00 AM TO 8:00 PM\n\
        WOODLAWN HIGH SCHOOL\n\
        15755 JEFFERSON HWY\n\
        BATON ROUGE, LA 70817\n\
        Back";

    #[test]
    fn test_extract_voter_info() {
        let info = extract_voter_info(RESULTS_PAGE);
        assert_eq!(info.name.as_deref(), Some("Ashtyn Elizabeth Roberts"));
        assert_eq!(info.parish.as_deref(), Some("East Baton Rouge"));
        assert_eq!(info.ward_precinct.as_deref(), Some("03/016"));
        assert_eq!(info.status.as_deref(), Some("Active"));
        assert_eq!(info.party.as_deref(), Some("No Party"));
    }

    #[test]
    fn test_extract_voter_info_from_unrelated_page() {
        let info = extract_voter_info("We could not find a voter matching that information.");
        assert!(info.is_empty());
    }

    #[test]
    fn test_inline_layout() {
        // ラベルが1行に並ぶレイアウト
        let text = "Parish: Orleans Status: Inactive Party: Democrat Ward/Precinct: 12/7";
        let info = extract_voter_info(text);
        assert_eq!(info.parish.as_deref(), Some("Orleans"));
        assert_eq!(info.status.as_deref(), Some("Inactive"));
        assert_eq!(info.ward_precinct.as_deref(), Some("12/7"));
    }

    #[test]
    fn test_find_uid_prefers_url() {
        let uid = find_voter_uid(
            "https://voterportal.sos.la.gov/Home/VoterInfo?uid=abc-123",
            &["https://voterportal.sos.la.gov/x?uid=fff".to_string()],
            "",
        );
        assert_eq!(uid.as_deref(), Some("abc-123"));
    }

    #[test]
    fn test_find_uid_prefers_voting_link() {
        let hrefs = vec![
            "https://voterportal.sos.la.gov/Home/Profile?uid=aaaa".to_string(),
            "https://voterportal.sos.la.gov/Voting/Index/ElectionDayVoting?uid=3f2a9c1e-77b0-4c1d"
                .to_string(),
        ];
        let uid = find_voter_uid("https://voterportal.sos.la.gov/Home/VoterLogin", &hrefs, "");
        assert_eq!(uid.as_deref(), Some("3f2a9c1e-77b0-4c1d"));
    }

    #[test]
    fn test_find_uid_in_page_source() {
        let source = r#"<script>var link = "/Voting/Index/EarlyVoting?uid=0badf00d";</script>"#;
        assert_eq!(
            find_voter_uid("about:blank", &[], source).as_deref(),
            Some("0badf00d")
        );
        assert_eq!(find_voter_uid("about:blank", &[], "<html></html>"), None);
    }

    #[test]
    fn test_location_line_heuristic() {
        let location = extract_voting_location(LOCATION_PAGE, &[]);
        assert_eq!(location.name.as_deref(), Some("WOODLAWN HIGH SCHOOL"));
        assert_eq!(
            location.address.as_deref(),
            Some("15755 JEFFERSON HWY, BATON ROUGE, LA 70817")
        );
    }

    #[test]
    fn test_location_address_pattern_and_emphasis_fallback() {
        let text = "Your election day location\n1234 Main Street\nBaton Rouge, LA 70808\n";
        let emphasized = vec![
            "ELECTION DAY VOTING".to_string(),
            "ST. GEORGE FIRE STATION".to_string(),
        ];

        let location = extract_voting_location(text, &emphasized);
        assert_eq!(
            location.address.as_deref(),
            Some("1234 Main Street, Baton Rouge, LA 70808")
        );
        assert_eq!(location.name.as_deref(), Some("ST. GEORGE FIRE STATION"));
    }

    #[test]
    fn test_location_not_found() {
        let location = extract_voting_location("No election scheduled.", &[]);
        assert!(location.is_empty());
    }

    #[test]
    fn test_is_all_caps() {
        assert!(is_all_caps("WOODLAWN HIGH SCHOOL"));
        assert!(is_all_caps("ST. GEORGE 2"));
        assert!(!is_all_caps("1234 5678"));
        assert!(!is_all_caps("Woodlawn"));
    }
}
