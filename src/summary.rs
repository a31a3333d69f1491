//! 住民投票案件の AI 要約
//!
//! Gemini の generateContent で平易な要約を作り、ballot_propositions に `ai_*` として追記する

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::store::{fields, Document, DocumentStore, Fields, StoreError, Value, BALLOT_PROPOSITIONS};

pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";
const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const PLACEHOLDER_KEY: &str = "YOUR_GEMINI_API_KEY_HERE";

/// プロンプトに含める本文の最大文字数
const PROMPT_TEXT_CHARS: usize = 3000;
const BATCH_SIZE: usize = 10;
const REQUEST_PAUSE: Duration = Duration::from_secs(2);

#[derive(Error, Debug)]
pub enum SummaryError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Gemini API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Gemini API returned no text")]
    EmptyResponse,

    #[error("Proposition not found: {0}")]
    NotFound(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// プロンプトからテキストを生成する
#[async_trait]
pub trait SummaryGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, SummaryError>;
}

pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiClient {
    /// API キーが無い、またはプレースホルダのままなら設定エラー
    pub fn new(api_key: Option<String>) -> Result<Self, SummaryError> {
        let api_key = api_key
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty() && k != PLACEHOLDER_KEY)
            .ok_or_else(|| {
                SummaryError::Config(
                    "Gemini API key not found. Set GEMINI_API_KEY and run again".into(),
                )
            })?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            http,
            api_key,
            model: DEFAULT_MODEL.to_string(),
            base_url: GEMINI_BASE_URL.to_string(),
        })
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

impl GenerateResponse {
    /// 最初の候補のテキストを連結
    fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        (!text.trim().is_empty()).then_some(text)
    }
}

#[async_trait]
impl SummaryGenerator for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, SummaryError> {
        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });

        let response = self
            .http
            .post(self.endpoint())
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SummaryError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: GenerateResponse = response.json().await?;
        parsed.text().ok_or(SummaryError::EmptyResponse)
    }
}

/// 要約プロンプト
pub fn build_prompt(title: &str, full_text: &str) -> String {
    let excerpt: String = full_text.chars().take(PROMPT_TEXT_CHARS).collect();
    format!(
        "You are helping voters understand ballot propositions.

Proposition Title: {title}

Full Text:
{excerpt}

Please provide:
1. A 2-3 sentence plain-language summary that explains what this proposition does
2. 3-5 key points voters should know
3. What a YES vote means
4. What a NO vote means

Format your response as:

SUMMARY:
[Your plain-language summary here]

KEY POINTS:
- [Point 1]
- [Point 2]
- [Point 3]

YES VOTE:
[What happens if proposition passes]

NO VOTE:
[What happens if proposition fails]

Keep language simple and objective. Avoid political bias."
    )
}

/// 要約結果の4セクション
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AiSummary {
    pub summary: String,
    pub key_points: String,
    pub yes_vote: String,
    pub no_vote: String,
}

impl AiSummary {
    /// ballot_propositions への追記内容
    pub fn to_fields(&self) -> Fields {
        fields([
            ("ai_summary", Value::from(self.summary.as_str())),
            ("ai_key_points", Value::from(self.key_points.as_str())),
            ("ai_yes_vote", Value::from(self.yes_vote.as_str())),
            ("ai_no_vote", Value::from(self.no_vote.as_str())),
            ("ai_generated_at", Value::from(Utc::now())),
        ])
    }
}

/// `SUMMARY:` / `KEY POINTS:` / `YES VOTE:` / `NO VOTE:` の見出しで分割
///
/// 見出し行の同じ行に続く文字は捨てる。空行は詰める
pub fn parse_summary(text: &str) -> AiSummary {
    const HEADINGS: [&str; 4] = ["SUMMARY:", "KEY POINTS:", "YES VOTE:", "NO VOTE:"];

    let mut sections: [Vec<&str>; 4] = Default::default();
    let mut current: Option<usize> = None;

    for line in text.lines().map(str::trim) {
        if let Some(index) = HEADINGS.iter().position(|h| line.starts_with(h)) {
            sections[index].clear();
            current = Some(index);
        } else if let (Some(index), false) = (current, line.is_empty()) {
            sections[index].push(line);
        }
    }

    let [summary, key_points, yes_vote, no_vote] = sections.map(|lines| lines.join("\n"));
    AiSummary {
        summary,
        key_points,
        yes_vote,
        no_vote,
    }
}

/// summarize_one の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryOutcome {
    Updated,
    AlreadySummarized,
}

/// summarize_all の集計
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SummaryStats {
    pub processed: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
}

fn has_summary(doc: &Document) -> bool {
    doc.get_str("ai_summary").is_some_and(|s| !s.is_empty())
}

fn short_title(doc: &Document) -> String {
    doc.get_str("title")
        .unwrap_or("Unknown")
        .chars()
        .take(50)
        .collect()
}

pub struct Summarizer<G> {
    store: Arc<dyn DocumentStore>,
    generator: G,
    pause: Duration,
}

impl<G: SummaryGenerator> Summarizer<G> {
    pub fn new(store: Arc<dyn DocumentStore>, generator: G) -> Self {
        Self {
            store,
            generator,
            pause: REQUEST_PAUSE,
        }
    }

    /// 生成ごとの待機時間
    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }

    async fn generate_for(&self, doc: &Document) -> Result<AiSummary, SummaryError> {
        let title = doc.get_str("title").unwrap_or_default();
        let full_text = doc.get_str("full_text").unwrap_or_default();
        info!(
            "Generating summary for: {}...",
            title.chars().take(50).collect::<String>()
        );

        let response = self.generator.generate(&build_prompt(title, full_text)).await?;
        debug!("Gemini response: {} chars", response.len());
        Ok(parse_summary(&response))
    }

    /// 1件だけ要約（要約済みなら何もしない）
    pub async fn summarize_one(&self, id: &str) -> Result<SummaryOutcome, SummaryError> {
        info!("Adding summary to proposition: {}", id);
        let doc = self
            .store
            .get(BALLOT_PROPOSITIONS, id)
            .await?
            .ok_or_else(|| SummaryError::NotFound(id.to_string()))?;

        if has_summary(&doc) {
            info!("Proposition already has summary");
            return Ok(SummaryOutcome::AlreadySummarized);
        }

        let summary = self.generate_for(&doc).await?;
        self.store
            .update(BALLOT_PROPOSITIONS, id, summary.to_fields())
            .await?;
        info!("Summary added to {}", id);
        Ok(SummaryOutcome::Updated)
    }

    /// 要約の無い案件をすべて要約する
    ///
    /// 10件ずつID順に読み、1件の失敗では止めない
    pub async fn summarize_all(&self) -> Result<SummaryStats, SummaryError> {
        let mut stats = SummaryStats::default();
        let mut cursor: Option<String> = None;

        loop {
            let batch = self
                .store
                .list_page(BALLOT_PROPOSITIONS, BATCH_SIZE, cursor.as_deref())
                .await?;
            if batch.is_empty() {
                break;
            }

            for doc in &batch {
                stats.processed += 1;

                if has_summary(doc) {
                    info!(
                        "[{}] Skipping (already has summary): {}",
                        stats.processed,
                        short_title(doc)
                    );
                    stats.skipped += 1;
                    continue;
                }

                info!("[{}] Processing: {}", stats.processed, short_title(doc));
                match self.generate_for(doc).await {
                    Ok(summary) => {
                        match self
                            .store
                            .update(BALLOT_PROPOSITIONS, &doc.id, summary.to_fields())
                            .await
                        {
                            Ok(()) => {
                                info!("Summary saved for {}", doc.id);
                                stats.updated += 1;
                            }
                            Err(e) => {
                                error!("Error saving summary for {}: {}", doc.id, e);
                                stats.failed += 1;
                            }
                        }
                        sleep(self.pause).await;
                    }
                    Err(e) => {
                        warn!("Failed to generate summary for {}: {}", doc.id, e);
                        stats.failed += 1;
                    }
                }
            }

            cursor = batch.last().map(|doc| doc.id.clone());
            if batch.len() < BATCH_SIZE {
                break;
            }
        }

        info!(
            "Complete: processed {} propositions (updated {}, skipped {}, failed {})",
            stats.processed, stats.updated, stats.skipped, stats.failed
        );
        Ok(stats)
    }
}
