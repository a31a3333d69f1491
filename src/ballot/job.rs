//! 住民投票案件の取得とストアへの保存

use std::time::Duration;

use tokio::time::sleep;
use tracing::{error, info};

use crate::config::ScraperConfig;
use crate::error::ScraperError;
use crate::parish::dropdown_label;
use crate::store::{DocumentStore, BALLOT_PROPOSITIONS, USERS};
use crate::traits::Scraper;

use super::scraper::BallotScraper;
use super::types::{BallotProposition, DEFAULT_ELECTION};

/// 保存間隔
const SAVE_PAUSE: Duration = Duration::from_millis(250);

/// パリッシュ・選挙日の案件を取得して ballot_propositions に保存
///
/// 同じ (パリッシュ, 選挙日, タイトル) のドキュメントは上書きされる
pub async fn scrape_parish_for_election(
    store: &dyn DocumentStore,
    config: &ScraperConfig,
    parish: &str,
    election: &str,
) -> Result<Vec<BallotProposition>, ScraperError> {
    let label = dropdown_label(parish);
    if label != parish {
        info!("Formatted parish: {} -> {}", parish, label);
    }

    let mut scraper = BallotScraper::new(config.clone(), label, election);
    let propositions = scraper.execute().await?;
    save_propositions(store, &propositions).await?;

    info!("Scrape finished! Saved {} propositions", propositions.len());
    Ok(propositions)
}

/// 案件を順に保存
pub async fn save_propositions(
    store: &dyn DocumentStore,
    propositions: &[BallotProposition],
) -> Result<(), ScraperError> {
    for (i, proposition) in propositions.iter().enumerate() {
        if i > 0 {
            sleep(SAVE_PAUSE).await;
        }
        let id = proposition.document_id();
        info!(
            "  Saving to store: {}...",
            id.chars().take(50).collect::<String>()
        );
        store
            .set(BALLOT_PROPOSITIONS, &id, proposition.to_fields())
            .await
            .map_err(|e| {
                error!("Error saving proposition {}: {}", id, e);
                e
            })?;
    }
    Ok(())
}

/// users/{uid} の voter_parish について案件を取得
pub async fn scrape_for_user(
    store: &dyn DocumentStore,
    config: &ScraperConfig,
    user_id: &str,
    election: Option<&str>,
) -> Result<Vec<BallotProposition>, ScraperError> {
    info!("Fetching propositions for user: {}", user_id);

    let user = store
        .get(USERS, user_id)
        .await?
        .ok_or_else(|| ScraperError::MissingInput(format!("User not found: {}", user_id)))?;

    let parish = user
        .get_str("voter_parish")
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| ScraperError::MissingInput("User has no voter_parish".into()))?;
    info!("User's parish: {}", parish);

    let election = election.unwrap_or_else(|| {
        info!("Using default election: {}", DEFAULT_ELECTION);
        DEFAULT_ELECTION
    });

    let propositions = scrape_parish_for_election(store, config, parish, election).await?;
    info!("Done! Propositions saved for {}", parish);
    Ok(propositions)
}
