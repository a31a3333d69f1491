//! スクレイパー実行サービス
//!
//! users を定期的に確認し、有権者情報や住民投票案件が未取得のユーザーについて
//! 自身のバイナリを子プロセスとして起動する

use std::collections::HashSet;
use std::future::Future;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::process::Command;
use tokio::time::{sleep, timeout};
use tracing::{error, info, warn};

use crate::config::ServiceConfig;
use crate::parish::fix_user_parish;
use crate::store::{
    fields, Document, DocumentStore, StoreError, Value, BALLOT_PROPOSITIONS, SCRAPER_LOG, USERS,
};

/// 子プロセスで実行するジョブの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    VoterInfo,
    BallotPropositions,
}

impl JobKind {
    /// scraper_log.scraper_type の値
    pub fn log_type(&self) -> &'static str {
        match self {
            JobKind::VoterInfo => "voter_info",
            JobKind::BallotPropositions => "ballot_propositions",
        }
    }

    /// 子プロセスのサブコマンド
    pub fn subcommand(&self) -> &'static str {
        match self {
            JobKind::VoterInfo => "voter",
            JobKind::BallotPropositions => "ballot",
        }
    }
}

/// ジョブの実行結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    /// 非0終了（シグナル終了時は None）
    Failed(Option<i32>),
    TimedOut,
    /// 起動できなかった等
    Error(String),
}

impl RunOutcome {
    /// scraper_log.status の値
    pub fn status(&self) -> &'static str {
        match self {
            RunOutcome::Completed => "completed",
            RunOutcome::Failed(_) => "failed",
            RunOutcome::TimedOut => "timeout",
            RunOutcome::Error(_) => "error",
        }
    }

    /// scraper_log.error の値
    pub fn error(&self) -> Option<String> {
        match self {
            RunOutcome::Completed | RunOutcome::TimedOut => None,
            RunOutcome::Failed(Some(code)) => Some(format!("Exit code {}", code)),
            RunOutcome::Failed(None) => Some("Terminated by signal".to_string()),
            RunOutcome::Error(message) => Some(message.clone()),
        }
    }
}

#[async_trait]
pub trait JobRunner: Send + Sync {
    /// ジョブを実行し、終了か `limit` 経過まで待つ
    async fn run(&self, kind: JobKind, user_id: &str, limit: Duration) -> RunOutcome;
}

/// `<program> [global args] <subcommand> <uid>` を起動する
#[derive(Debug, Clone)]
pub struct SubprocessRunner {
    program: PathBuf,
    global_args: Vec<String>,
    envs: Vec<(String, String)>,
}

impl SubprocessRunner {
    pub fn new(program: impl Into<PathBuf>, global_args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            global_args,
            envs: Vec::new(),
        }
    }

    /// 子プロセスに追加で渡す環境変数
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// 実行中のバイナリ自身を起動する
    pub fn current_exe(global_args: Vec<String>) -> std::io::Result<Self> {
        Ok(Self::new(std::env::current_exe()?, global_args))
    }
}

#[async_trait]
impl JobRunner for SubprocessRunner {
    async fn run(&self, kind: JobKind, user_id: &str, limit: Duration) -> RunOutcome {
        let spawned = Command::new(&self.program)
            .args(&self.global_args)
            .arg(kind.subcommand())
            .arg(user_id)
            .envs(self.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn();

        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => return RunOutcome::Error(e.to_string()),
        };

        let waited = timeout(limit, child.wait()).await;
        match waited {
            Ok(Ok(status)) if status.success() => RunOutcome::Completed,
            Ok(Ok(status)) => RunOutcome::Failed(status.code()),
            Ok(Err(e)) => RunOutcome::Error(e.to_string()),
            Err(_) => {
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill timed out {} job: {}", kind.subcommand(), e);
                }
                RunOutcome::TimedOut
            }
        }
    }
}

/// 有権者情報の取得が必要か（ZIP・生年月あり、voter_parish なし）
pub fn needs_voter_info(user: &Document) -> bool {
    user.has("zip_code")
        && user.has("birth_month")
        && user.has("birth_year")
        && !user.has("voter_parish")
}

pub struct PollingService<R> {
    store: Arc<dyn DocumentStore>,
    runner: R,
    config: ServiceConfig,
    processed: HashSet<String>,
}

impl<R: JobRunner> PollingService<R> {
    pub fn new(store: Arc<dyn DocumentStore>, runner: R, config: ServiceConfig) -> Self {
        Self {
            store,
            runner,
            config,
            processed: HashSet::new(),
        }
    }

    pub fn processed_count(&self) -> usize {
        self.processed.len()
    }

    pub fn is_processed(&self, user_id: &str) -> bool {
        self.processed.contains(user_id)
    }

    /// scraper_log の completed から処理済みユーザーを復元
    pub async fn load_processed_users(&mut self) -> Result<usize, StoreError> {
        let logs = self.store.list(SCRAPER_LOG).await?;
        let completed = logs
            .iter()
            .filter(|log| log.get_str("status") == Some(RunOutcome::Completed.status()))
            .filter_map(|log| log.get_str("user_id"));
        self.processed.extend(completed.map(str::to_string));

        info!("Loaded {} processed users", self.processed.len());
        Ok(self.processed.len())
    }

    /// 実行記録を追加。失敗はログのみ
    async fn log_run(&self, user_id: &str, kind: JobKind, outcome: &RunOutcome) {
        let entry = fields([
            ("user_id", Value::from(user_id)),
            ("scraper_type", Value::from(kind.log_type())),
            ("status", Value::from(outcome.status())),
            ("error", Value::from(outcome.error())),
            ("timestamp", Value::from(Utc::now())),
        ]);
        if let Err(e) = self.store.add(SCRAPER_LOG, entry).await {
            error!("Error logging scraper run: {}", e);
        }
    }

    /// 有権者情報が未取得のユーザーについてジョブを実行。実行件数を返す
    pub async fn check_for_new_voter_info(&mut self) -> Result<usize, StoreError> {
        let users = self.store.list(USERS).await?;
        let mut started = 0;

        for user in users {
            if self.processed.contains(&user.id) || !needs_voter_info(&user) {
                continue;
            }
            info!(
                "Found new user needing voter info: {} (birth {:?}/{:?})",
                user.id,
                user.get_i64("birth_month"),
                user.get_i64("birth_year")
            );
            self.run_voter_job(&user.id).await;
            started += 1;
        }
        Ok(started)
    }

    async fn run_voter_job(&mut self, user_id: &str) {
        info!("Starting voter scraper for {}...", user_id);
        let outcome = self
            .runner
            .run(JobKind::VoterInfo, user_id, self.config.voter_timeout)
            .await;
        self.log_run(user_id, JobKind::VoterInfo, &outcome).await;

        match &outcome {
            RunOutcome::Completed => {
                info!("Voter scraper completed for {}", user_id);
                self.processed.insert(user_id.to_string());
                self.verify_voter_info(user_id).await;
            }
            RunOutcome::TimedOut => warn!("Voter scraper timed out for {}", user_id),
            other => error!(
                "Voter scraper failed for {}: {}",
                user_id,
                other.error().unwrap_or_default()
            ),
        }
    }

    /// 保存された voter_parish を確認し、表記を直す
    async fn verify_voter_info(&self, user_id: &str) {
        let saved = match self.store.get(USERS, user_id).await {
            Ok(user) => user.is_some_and(|u| u.get_str("voter_parish").is_some_and(|p| !p.is_empty())),
            Err(e) => {
                warn!("Could not verify voter info for {}: {}", user_id, e);
                return;
            }
        };
        if !saved {
            warn!("No parish data saved for {}", user_id);
            return;
        }

        info!("Verified: parish saved for {}", user_id);
        match fix_user_parish(self.store.as_ref(), user_id).await {
            Ok(fix) if fix.is_ok() => {}
            Ok(fix) => warn!("Could not fix parish format for {}: {:?}", user_id, fix),
            Err(e) => warn!("Error fixing parish format for {}: {}", user_id, e),
        }
    }

    /// 案件が1件も無いパリッシュごとに、そのパリッシュのユーザー1人でジョブを実行
    pub async fn check_for_new_ballot_needs(&self) -> Result<usize, StoreError> {
        let users = self.store.list(USERS).await?;
        let mut checked = HashSet::new();
        let mut targets: Vec<(String, String)> = Vec::new();

        for user in &users {
            let Some(parish) = user.get_str("voter_parish").filter(|p| !p.is_empty()) else {
                continue;
            };
            if !checked.insert(parish.to_string()) {
                continue;
            }

            let existing = self
                .store
                .find(BALLOT_PROPOSITIONS, "parish", &Value::from(parish), 1)
                .await?;
            if existing.is_empty() {
                info!("Found parish needing propositions: {}", parish);
                targets.push((parish.to_string(), user.id.clone()));
            }
        }

        for (parish, user_id) in &targets {
            self.run_ballot_job(user_id, parish).await;
        }
        Ok(targets.len())
    }

    async fn run_ballot_job(&self, user_id: &str, parish: &str) {
        info!("Starting ballot scraper for {}...", user_id);
        let outcome = self
            .runner
            .run(
                JobKind::BallotPropositions,
                user_id,
                self.config.ballot_timeout,
            )
            .await;
        self.log_run(user_id, JobKind::BallotPropositions, &outcome).await;

        match &outcome {
            RunOutcome::Completed => {
                info!("Ballot scraper completed for {}", user_id);
                match self
                    .store
                    .find(BALLOT_PROPOSITIONS, "parish", &Value::from(parish), 1)
                    .await
                {
                    Ok(found) if !found.is_empty() => {
                        info!("Verified: propositions saved for {}", parish)
                    }
                    Ok(_) => warn!("No propositions found for {}", parish),
                    Err(e) => warn!("Could not verify propositions for {}: {}", parish, e),
                }
            }
            RunOutcome::TimedOut => warn!("Ballot scraper timed out for {}", user_id),
            other => error!(
                "Ballot scraper failed for {}: {}",
                user_id,
                other.error().unwrap_or_default()
            ),
        }
    }

    /// 1回分の確認。エラーはログに残して続行する
    pub async fn run_cycle(&mut self) {
        info!("Checking for new scrapers to run...");

        if let Err(e) = self.check_for_new_voter_info().await {
            error!("Error checking for new voter info: {}", e);
        }
        if let Err(e) = self.check_for_new_ballot_needs().await {
            error!("Error checking for ballot needs: {}", e);
        }

        info!(
            "Check complete. Processed {} users so far. Sleeping {}s...",
            self.processed.len(),
            self.config.check_interval.as_secs()
        );
    }

    /// 次の確認まで待つ（heartbeat_interval ごとに生存ログ）
    async fn idle(&self) {
        let mut remaining = self.config.check_interval;
        while !remaining.is_zero() {
            let step = if self.config.heartbeat_interval.is_zero() {
                remaining
            } else {
                remaining.min(self.config.heartbeat_interval)
            };
            sleep(step).await;
            remaining -= step;
            if !remaining.is_zero() {
                info!("... still running ({}s remaining)", remaining.as_secs());
            }
        }
    }

    /// `shutdown` が完了するまで確認を繰り返す
    pub async fn run<F>(&mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        info!(
            "Scraper service starting (interval {}s)",
            self.config.check_interval.as_secs()
        );
        if let Err(e) = self.load_processed_users().await {
            error!("Error loading processed users: {}", e);
        }

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutting down service...");
                    break;
                }
                _ = async {
                    self.run_cycle().await;
                    self.idle().await;
                } => {}
            }
        }
        info!("Service stopped");
    }
}
