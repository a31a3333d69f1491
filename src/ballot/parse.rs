//! 住民投票案件ページの HTML 解析

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use super::types::PropositionLink;

/// 本文コンテナの候補（上から順に試す）
const CONTENT_SELECTORS: [&str; 6] = [
    "div#MainContent_ContentPlaceHolder1",
    "div#MainContent",
    "div#ContentPlaceHolder1",
    "div#Content",
    "div.content",
    "article",
];

/// 本文から除外するナビゲーション要素
const NAV_SELECTOR: &str = "nav, .breadcrumb, a[href*=\"PropositionText\"]";

/// 案件リンクとみなすリンクテキストのキーワード
const LINK_KEYWORDS: [&str; 5] = ["Proposition", "Proposed", "Parish", "Fire", "School"];

const MIN_CONTENT_CHARS: usize = 80;
const MAX_TITLE_CHARS: usize = 150;
const MAX_ID_CHARS: usize = 200;

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static ID_INVALID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9_\-]").unwrap());
static NAV_PHRASE_RES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)back to proposition list",
        r"(?i)return to.*",
        r"(?i)click here.*",
        r"(?i)view.*election.*",
        r"(?i)home\s*>\s*proposition",
        r"(?i)breadcrumb.*",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});
static BLANK_LINES_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*\n\s*\n+").unwrap());
static SPACES_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r" +").unwrap());
static TITLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(.*Proposition.*(?:No\.|Number)\s*\d+.*|.*Fire.*District.*|.*School.*System.*)",
    )
    .unwrap()
});
static TRAILING_COLON_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r":\s*$").unwrap());

fn sel(css: &str) -> Selector {
    Selector::parse(css).expect("static selector must parse")
}

/// Firestore のドキュメントIDとして安全な文字列にする
///
/// 空白 → `_`、英数字と `_` `-` 以外を除去、小文字化、最大200文字
pub fn sanitize_id(text: &str) -> String {
    let underscored = WHITESPACE_RE.replace_all(text.trim(), "_");
    ID_INVALID_RE
        .replace_all(&underscored, "")
        .to_lowercase()
        .chars()
        .take(MAX_ID_CHARS)
        .collect()
}

/// ナビゲーション文言と余分な空白を取り除く
pub fn clean_proposition_text(text: &str) -> String {
    let mut cleaned = text.to_string();
    for re in NAV_PHRASE_RES.iter() {
        cleaned = re.replace_all(&cleaned, "").into_owned();
    }
    let cleaned = BLANK_LINES_RE.replace_all(&cleaned, "\n\n");
    let cleaned = SPACES_RE.replace_all(&cleaned, " ");
    cleaned.trim().to_string()
}

fn is_skipped(element: ElementRef<'_>, excluded: Option<&Selector>) -> bool {
    matches!(element.value().name(), "script" | "style" | "noscript")
        || excluded.is_some_and(|s| s.matches(&element))
}

/// 要素配下のテキスト片（trim 済み・空は除外）。除外要素配下は読まない
fn text_pieces<'a>(root: ElementRef<'a>, excluded: Option<&Selector>) -> Vec<&'a str> {
    root.descendants()
        .filter_map(|node| {
            let text = node.value().as_text()?;
            let skipped = node
                .ancestors()
                .take_while(|ancestor| ancestor.id() != root.id())
                .filter_map(ElementRef::wrap)
                .any(|el| is_skipped(el, excluded));
            (!skipped).then_some(&**text)
        })
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect()
}

/// 要素のテキストを1行にまとめる
fn element_text(element: ElementRef<'_>) -> String {
    WHITESPACE_RE
        .replace_all(&text_pieces(element, None).join(" "), " ")
        .trim()
        .to_string()
}

/// 一覧ページから案件リンクを抽出（テキスト + href で重複除去、出現順）
pub fn extract_proposition_links(html: &str) -> Vec<PropositionLink> {
    let document = Html::parse_document(html);
    let anchors = sel("a[href]");
    let mut seen = HashSet::new();

    document
        .select(&anchors)
        .filter_map(|a| {
            let text = element_text(a);
            let href = a.value().attr("href")?.trim().to_string();
            let is_candidate = !text.is_empty()
                && LINK_KEYWORDS.iter().any(|k| text.contains(k))
                && !href.to_lowercase().contains("javascript");
            is_candidate.then_some(PropositionLink { text, href })
        })
        .filter(|link| seen.insert(link.clone()))
        .collect()
}

/// 案件ページの本文
pub fn extract_main_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let excluded = sel(NAV_SELECTOR);

    for css in CONTENT_SELECTORS {
        if let Some(container) = document.select(&sel(css)).next() {
            let text = text_pieces(container, Some(&excluded)).join("\n");
            if text.chars().count() > MIN_CONTENT_CHARS {
                return clean_proposition_text(&text);
            }
        }
    }

    let all_text = text_pieces(document.root_element(), None).join(" ");
    clean_proposition_text(&all_text)
}

/// 案件ページのタイトル
///
/// 「Proposition No. N」等のパターンを含む見出し → 最初の h1/h2 → `fallback`
pub fn extract_proposition_title(html: &str, fallback: &str) -> String {
    let document = Html::parse_document(html);

    for tag in ["h1", "h2", "h3", "strong", "b"] {
        for element in document.select(&sel(tag)) {
            let text = element_text(element);
            if TITLE_RE.is_match(&text) && text.chars().count() < MAX_TITLE_CHARS {
                let title = text.replace("Proposition Text", "");
                let title = TRAILING_COLON_RE.replace(title.trim(), "");
                let title = title.trim();
                if !title.is_empty() {
                    return title.to_string();
                }
            }
        }
    }

    for tag in ["h1", "h2"] {
        if let Some(element) = document.select(&sel(tag)).next() {
            let text = element_text(element);
            let lower = text.to_lowercase();
            if !text.is_empty()
                && text.chars().count() < MAX_TITLE_CHARS
                && lower != "proposition text"
                && lower != "home"
            {
                return text;
            }
        }
    }

    fallback.to_string()
}
