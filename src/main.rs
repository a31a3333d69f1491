//! lawgic-scraper CLI
//!
//! 実行方法:
//! ```text
//! lawgic-scraper voter <UID>
//! lawgic-scraper ballot <UID> [ELECTION]
//! lawgic-scraper service
//! lawgic-scraper serve --port 5000
//! lawgic-scraper fix-parish --all
//! lawgic-scraper summarize [ID]
//! ```

use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::builder::BoolishValueParser;
use clap::{ArgAction, Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use lawgic_scraper::api::{self, AppState};
use lawgic_scraper::ballot::{self, BallotProposition, DEFAULT_ELECTION, DEFAULT_PARISH};
use lawgic_scraper::config::{ApiConfig, ScraperConfig, ServiceConfig, StoreConfig};
use lawgic_scraper::parish::{self, ParishFix};
use lawgic_scraper::poller::{PollingService, SubprocessRunner};
use lawgic_scraper::service::VoterInfoService;
use lawgic_scraper::signal::shutdown_signal;
use lawgic_scraper::store::{DocumentStore, FirestoreStore, MemoryStore};
use lawgic_scraper::summary::{GeminiClient, Summarizer, SummaryOutcome, DEFAULT_MODEL};
use lawgic_scraper::voter::{self, VoterInfo, VoterQuery};

#[derive(Parser, Debug)]
#[command(name = "lawgic-scraper")]
#[command(about = "Louisiana voter portal scraper service")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    global: GlobalOpts,

    #[command(subcommand)]
    command: Commands,
}

/// 全サブコマンド共通（service は子プロセスにも引き継ぐ）
#[derive(Args, Debug, Clone)]
struct GlobalOpts {
    /// Firestore プロジェクトID
    #[arg(long, global = true, env = "FIRESTORE_PROJECT_ID")]
    project: Option<String>,

    /// Firestore REST API のアクセストークン
    #[arg(long, global = true, env = "FIRESTORE_ACCESS_TOKEN", hide_env_values = true)]
    access_token: Option<String>,

    /// Firestore エミュレータ (host:port)
    #[arg(long, global = true, env = "FIRESTORE_EMULATOR_HOST")]
    emulator_host: Option<String>,

    /// プロセス内ストアを使う（保存されない）
    #[arg(long, global = true)]
    memory_store: bool,

    /// Chrome 実行ファイル
    #[arg(long, global = true, env = "CHROME_PATH")]
    chrome_path: Option<String>,

    /// ヘッドレスモード
    #[arg(
        long,
        global = true,
        env = "HEADLESS",
        default_value_t = true,
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new()
    )]
    headless: bool,

    /// デバッグログとスクリーンショット
    #[arg(long, global = true)]
    debug: bool,
}

impl GlobalOpts {
    fn scraper_config(&self) -> ScraperConfig {
        ScraperConfig::new()
            .with_headless(self.headless)
            .with_debug(self.debug)
            .with_chrome_path(self.chrome_path.clone())
    }

    fn open_store(&self) -> Result<Arc<dyn DocumentStore>> {
        if self.memory_store {
            warn!("Using in-memory store; nothing will be persisted");
            return Ok(Arc::new(MemoryStore::new()));
        }

        let project = self
            .project
            .clone()
            .context("Firestore project is required (--project or FIRESTORE_PROJECT_ID)")?;
        if self.emulator_host.is_none() && self.access_token.is_none() {
            bail!("FIRESTORE_ACCESS_TOKEN is required unless FIRESTORE_EMULATOR_HOST is set");
        }

        let config = StoreConfig::new(project)
            .with_access_token(self.access_token.clone())
            .with_emulator_host(self.emulator_host.clone());
        Ok(Arc::new(FirestoreStore::new(config)?))
    }

    /// 子プロセスに渡す引数（トークンは環境変数で渡す）
    fn child_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(project) = &self.project {
            args.extend(["--project".to_string(), project.clone()]);
        }
        if let Some(host) = &self.emulator_host {
            args.extend(["--emulator-host".to_string(), host.clone()]);
        }
        if self.memory_store {
            args.push("--memory-store".to_string());
        }
        if let Some(path) = &self.chrome_path {
            args.extend(["--chrome-path".to_string(), path.clone()]);
        }
        args.extend(["--headless".to_string(), self.headless.to_string()]);
        if self.debug {
            args.push("--debug".to_string());
        }
        args
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 有権者情報を取得して users/{UID} に保存（UID 省略時は対話モード）
    Voter { uid: Option<String> },

    /// 住民投票案件を取得して ballot_propositions に保存
    Ballot {
        /// voter_parish を使うユーザー
        uid: Option<String>,

        /// 選挙日（ドロップダウン表記）
        election: Option<String>,

        /// UID の代わりにパリッシュを直接指定（このとき位置引数は選挙日のみ）
        #[arg(long)]
        parish: Option<String>,
    },

    /// users を監視してスクレイパーを自動実行
    Service {
        /// 確認間隔（秒）
        #[arg(long, default_value_t = 60)]
        interval: u64,
    },

    /// 有権者照会 HTTP API を起動
    Serve {
        #[arg(long, default_value = "0.0.0.0")]
        host: String,

        #[arg(long, env = "API_PORT", default_value_t = 5000)]
        port: u16,
    },

    /// voter_parish を "PARISH - NN" 表記に直す
    FixParish {
        uid: Option<String>,

        #[arg(long, conflicts_with = "uid")]
        all: bool,
    },

    /// 住民投票案件に AI 要約を追加（ID 省略時は全件）
    Summarize {
        id: Option<String>,

        #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
        gemini_api_key: Option<String>,

        #[arg(long, default_value = DEFAULT_MODEL)]
        model: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.global.debug {
        "info,lawgic_scraper=debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    match cli.command {
        Commands::Voter { uid } => run_voter(&cli.global, uid).await,
        Commands::Ballot {
            uid,
            election,
            parish,
        } => run_ballot(&cli.global, uid, election, parish).await,
        Commands::Service { interval } => run_service(&cli.global, interval).await,
        Commands::Serve { host, port } => run_serve(&cli.global, host, port).await,
        Commands::FixParish { uid, all } => run_fix_parish(&cli.global, uid, all).await,
        Commands::Summarize {
            id,
            gemini_api_key,
            model,
        } => run_summarize(&cli.global, id, gemini_api_key, model).await,
    }
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn print_voter_info(info: &VoterInfo) {
    let show = |value: &Option<String>| value.clone().unwrap_or_else(|| "N/A".to_string());

    println!();
    println!("=== Voter Information ===");
    println!("Name:             {}", show(&info.name));
    println!("Parish:           {}", show(&info.parish));
    println!("Ward/Precinct:    {}", show(&info.ward_precinct));
    println!("Party:            {}", show(&info.party));
    println!("Status:           {}", show(&info.status));
    println!("Polling Location: {}", show(&info.voting_location_name));
    println!("Address:          {}", show(&info.voting_location_address));
}

fn print_propositions(propositions: &[BallotProposition]) {
    println!();
    println!("=== Saved {} propositions ===", propositions.len());
    for (i, p) in propositions.iter().enumerate() {
        println!("{}. {} ({} chars)", i + 1, p.title, p.full_text.chars().count());
    }
}

async fn run_voter(global: &GlobalOpts, uid: Option<String>) -> Result<()> {
    let store = global.open_store()?;
    let config = global.scraper_config();

    let info = match uid {
        Some(uid) => voter::fetch_from_store(store.as_ref(), &config, &uid).await?,
        None => {
            let uid = prompt("User ID: ")?;
            if uid.is_empty() {
                bail!("User ID is required");
            }

            if prompt("Fetch user data from the store? (y/n): ")?.eq_ignore_ascii_case("y") {
                voter::fetch_from_store(store.as_ref(), &config, &uid).await?
            } else {
                let first_name = prompt("First Name: ")?;
                let last_name = prompt("Last Name: ")?;
                let zip_code = prompt("ZIP Code (5 digits): ")?;
                let birth_month: u32 = prompt("Birth Month (1-12): ")?
                    .parse()
                    .context("Birth month must be a number")?;
                let birth_year: i32 = prompt("Birth Year (YYYY): ")?
                    .parse()
                    .context("Birth year must be a number")?;

                let query =
                    VoterQuery::new(first_name, last_name, zip_code, birth_month, birth_year);
                voter::fetch_and_save(store.as_ref(), &config, &uid, query).await?
            }
        }
    };

    print_voter_info(&info);
    Ok(())
}

async fn run_ballot(
    global: &GlobalOpts,
    uid: Option<String>,
    election: Option<String>,
    parish: Option<String>,
) -> Result<()> {
    let store = global.open_store()?;
    let config = global.scraper_config();

    let propositions = match (uid, parish) {
        (first, Some(parish)) => {
            if first.is_some() && election.is_some() {
                bail!("With --parish, give only the election date");
            }
            let election = election.or(first);
            let election = election.as_deref().unwrap_or(DEFAULT_ELECTION);
            ballot::scrape_parish_for_election(store.as_ref(), &config, &parish, election).await?
        }
        (Some(uid), None) => {
            ballot::scrape_for_user(store.as_ref(), &config, &uid, election.as_deref()).await?
        }
        (None, None) => {
            let election = election.as_deref().unwrap_or(DEFAULT_ELECTION);
            info!("No user given; scraping {} for {}", DEFAULT_PARISH, election);
            ballot::scrape_parish_for_election(store.as_ref(), &config, DEFAULT_PARISH, election)
                .await?
        }
    };

    print_propositions(&propositions);
    Ok(())
}

async fn run_service(global: &GlobalOpts, interval: u64) -> Result<()> {
    let store = global.open_store()?;

    let mut runner = SubprocessRunner::current_exe(global.child_args())
        .context("Could not locate the current executable")?;
    if let Some(token) = &global.access_token {
        runner = runner.with_env("FIRESTORE_ACCESS_TOKEN", token.clone());
    }

    let config = ServiceConfig::default().with_check_interval(Duration::from_secs(interval));
    let mut service = PollingService::new(store, runner, config);
    service.run(shutdown_signal()).await;
    Ok(())
}

async fn run_serve(global: &GlobalOpts, host: String, port: u16) -> Result<()> {
    let lookup = VoterInfoService::new(global.scraper_config());
    let config = ApiConfig { host, port };

    api::serve(AppState::new(lookup), &config)
        .await
        .context("API server error")?;
    info!("Server shutdown complete");
    Ok(())
}

async fn fix_one(store: &dyn DocumentStore, uid: &str) -> Result<()> {
    match parish::fix_user_parish(store, uid).await? {
        ParishFix::Updated { from, to } => println!("Updated {}: {} -> {}", uid, from, to),
        ParishFix::AlreadyFormatted(parish) => println!("Already formatted: {}", parish),
        other => bail!("Could not fix parish for {}: {:?}", uid, other),
    }
    Ok(())
}

async fn run_fix_parish(global: &GlobalOpts, uid: Option<String>, all: bool) -> Result<()> {
    let store = global.open_store()?;

    let target = match (uid, all) {
        (_, true) => None,
        (Some(uid), false) => Some(uid),
        (None, false) => {
            let input = prompt("Enter user ID (or '--all' for all users): ")?;
            if input.is_empty() {
                bail!("User ID is required");
            }
            (input != "--all").then_some(input)
        }
    };

    match target {
        Some(uid) => fix_one(store.as_ref(), &uid).await,
        None => {
            let (checked, updated) = parish::fix_all_users(store.as_ref()).await?;
            println!("Checked {} users, updated {}", checked, updated);
            Ok(())
        }
    }
}

async fn run_summarize(
    global: &GlobalOpts,
    id: Option<String>,
    api_key: Option<String>,
    model: String,
) -> Result<()> {
    let client = GeminiClient::new(api_key)?.with_model(model);
    let store = global.open_store()?;
    let summarizer = Summarizer::new(store, client);

    match id {
        Some(id) => match summarizer.summarize_one(&id).await? {
            SummaryOutcome::Updated => println!("Summary added to {}", id),
            SummaryOutcome::AlreadySummarized => println!("{} already has a summary", id),
        },
        None => {
            let stats = summarizer.summarize_all().await?;
            println!("Processed {} propositions", stats.processed);
            println!("  Updated: {}", stats.updated);
            println!("  Skipped: {}", stats.skipped);
            println!("  Failed:  {}", stats.failed);
        }
    }
    Ok(())
}
