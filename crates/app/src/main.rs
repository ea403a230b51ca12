use std::{process::ExitCode, sync::Arc};

use clap::Parser;
use engine::{MemoryStore, RemoteStore, SessionProvider, SqliteStore, Tracker, UserId};
use migration::{Migrator, MigratorTrait};
use rest_client::RestStore;
use settings::{Backend, Settings};

use crate::error::{AppError, Result};

mod cli;
mod commands;
mod error;
mod settings;
mod validate;

#[tokio::main]
async fn main() -> ExitCode {
    let args = cli::Args::parse();
    let settings = match Settings::load(&args) {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::from(2);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "budgetbuddy={level},engine={level},rest_client={level}",
            level = settings.level
        ))
        .with_writer(std::io::stderr)
        .init();

    match run(args.command, settings).await {
        Ok(output) => {
            print!("{output}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::debug!("command failed: {err:?}");
            eprintln!("{}", err.user_message());
            ExitCode::FAILURE
        }
    }
}

async fn run(command: cli::Command, settings: Settings) -> Result<String> {
    let user = settings.user.clone().ok_or(AppError::NoUser)?;
    let remote = connect(&settings.backend).await?;

    let provider = SessionProvider::signed_in(UserId::new(user));
    let tracker = Tracker::new(remote, provider.session());

    if settings.backend.provisions_profiles() {
        tracker
            .profile()
            .provision(settings.full_name.as_deref())
            .await?;
    }
    tracker.sync_session().await;

    commands::execute(&tracker, command).await
}

async fn connect(backend: &Backend) -> Result<Arc<dyn RemoteStore>> {
    match backend {
        Backend::Memory => {
            tracing::info!("using the in-memory backend, nothing will be kept");
            Ok(Arc::new(MemoryStore::new()))
        }
        Backend::Sqlite { path } => {
            let database = sea_orm::Database::connect(format!("sqlite:{path}?mode=rwc")).await?;
            Migrator::up(&database, None).await?;
            Ok(Arc::new(SqliteStore::new(database)))
        }
        Backend::Rest {
            base_url,
            api_key,
            access_token,
        } => {
            let mut store = RestStore::new(base_url, api_key.as_str())?;
            if let Some(token) = access_token {
                store = store.with_access_token(token.as_str());
            }
            Ok(Arc::new(store))
        }
    }
}
