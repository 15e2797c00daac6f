use clap::Parser;
use cli::{Cli, Command, FixtureArgs, SeedArgs};
use dotenv::dotenv;
use error::{AppError, AppResult};
use error_stack::ResultExt;
use error_stack::fmt::ColorMode;
use repositories::mongodb::fixtures::parse_fixture;
use repositories::mongodb::topics::MongoTopicStore;
use repositories::mongodb::{ConnectionDetails, StoreOptions};
use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;
use topics_core::census::census_subtopics;
use topics_core::model::NewTopic;
use topics_core::seeder::Seeder;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

mod cli;
mod error;

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();

    if let Err(e) = dotenv() {
        warn!("failed to load .env file: {e}");
    }

    match try_main(Cli::parse()).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("topics seed exited with error: {e:?}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging() {
    error_stack::Report::set_color_mode(ColorMode::None);

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_env("TOPICS_LOG"))
        .init();
}

async fn try_main(cli: Cli) -> AppResult<()> {
    match cli.command {
        Command::Seed(ref args) => seed(&cli, args).await,
        Command::Fixture(ref args) => load_fixture(&cli, args).await,
    }
}

#[instrument(skip_all)]
async fn seed(cli: &Cli, args: &SeedArgs) -> AppResult<()> {
    let subtopics = match &args.topics {
        Some(path) => read_subtopics(path)?,
        None => census_subtopics(),
    };
    let config = args.seed_config();

    let store = connect(cli, args.transactional, Some(args.store_timeout())).await?;

    debug!(
        "seeding '{}' with {} subtopics",
        config.parent.title,
        subtopics.len()
    );
    let outcome = Seeder::new(store, config)
        .change_context(AppError)?
        .run(&subtopics)
        .await
        .change_context(AppError)?;

    if outcome.dry_run {
        info!("dry run complete, parent topic would be {}", outcome.parent_id);
    } else {
        info!(
            "created parent topic {} with {} subtopics ({} documents written)",
            outcome.parent_id,
            outcome.child_ids.len(),
            outcome.documents_written
        );
    }
    Ok(())
}

#[instrument(skip_all, fields(file = %args.file.display()))]
async fn load_fixture(cli: &Cli, args: &FixtureArgs) -> AppResult<()> {
    let json = std::fs::read_to_string(&args.file)
        .change_context(AppError)
        .attach_with(|| format!("reading fixture {}", args.file.display()))?;
    let documents = parse_fixture(&json).change_context(AppError)?;

    let store = connect(cli, false, None).await?;
    let loaded = store
        .load_fixture(documents, !args.keep_existing)
        .await
        .change_context(AppError)?;

    if args.verbose {
        for document in &loaded {
            println!("{document}");
        }
    }
    info!("topics collection now holds {} documents", loaded.len());
    Ok(())
}

async fn connect(
    cli: &Cli,
    transactional: bool,
    timeout: Option<Duration>,
) -> AppResult<MongoTopicStore> {
    debug!("initializing mongodb store");
    MongoTopicStore::init(
        ConnectionDetails::Url(cli.database_url.clone()),
        StoreOptions {
            database: cli.database.clone(),
            transactional,
            timeout,
        },
    )
    .await
    .change_context(AppError)
}

fn read_subtopics(path: &Path) -> AppResult<Vec<NewTopic>> {
    let json = std::fs::read_to_string(path)
        .change_context(AppError)
        .attach_with(|| format!("reading subtopics from {}", path.display()))?;

    serde_json::from_str(&json)
        .change_context(AppError)
        .attach("subtopics file must be a JSON array of {\"title\", \"description\"} objects")
}
