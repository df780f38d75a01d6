use clap::Parser;
use marks_portal::app::PortalService;
use marks_portal::config::toml_config::{ProviderKind, StorageBackend, TomlConfig};
use marks_portal::config::{Command, SourcesCommand};
use marks_portal::core::cache::RosterBuilder;
use marks_portal::domain::model::{NewSource, SourceStatus};
use marks_portal::domain::ports::{AccountStore, SourceRegistry, TabularProvider};
use marks_portal::utils::{logger, validation::Validate};
use marks_portal::{
    CliConfig, CsvDirectoryProvider, GoogleSheetsProvider, JsonFileStore, MemoryStore,
    PortalError, RosterCache, RosterPipeline,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = CliConfig::parse();

    let config_found = std::path::Path::new(&cli.config).exists();
    let config = match cli.load_toml() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load config file '{}': {}", cli.config, e);
            eprintln!("💡 Make sure the file exists and is valid TOML format");
            std::process::exit(1);
        }
    };

    // 初始化日誌
    if cli.json_logs || config.json_logs() {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("Starting marks-portal");
    if !config_found {
        tracing::warn!("⚠️ Config file '{}' not found, using defaults", cli.config);
    }
    if cli.verbose {
        tracing::debug!("Config: {:?}", config);
    }

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 {}", e.recovery_suggestion());
        std::process::exit(1);
    }

    let portal = match build_portal(&config) {
        Ok(portal) => portal,
        Err(e) => {
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 {}", e.recovery_suggestion());
            std::process::exit(1);
        }
    };

    if let Err(e) = run(cli.command, &portal).await {
        tracing::error!("❌ Command failed: {}", e);
        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 {}", e.recovery_suggestion());
        std::process::exit(2);
    }

    Ok(())
}

fn build_portal(config: &TomlConfig) -> marks_portal::Result<PortalService<impl RosterBuilder>> {
    let provider: Arc<dyn TabularProvider> = match config.provider.kind {
        ProviderKind::Sheets => Arc::new(GoogleSheetsProvider::new(config.sheets_settings())?),
        ProviderKind::Csv => {
            let dir = config.provider.csv_dir.clone().unwrap_or_default();
            Arc::new(CsvDirectoryProvider::new(dir))
        }
    };

    let (accounts, registry): (Arc<dyn AccountStore>, Arc<dyn SourceRegistry>) =
        match config.storage.backend {
            StorageBackend::File => {
                let store = Arc::new(JsonFileStore::new(&config.storage.data_dir));
                let accounts: Arc<dyn AccountStore> = store.clone();
                let registry: Arc<dyn SourceRegistry> = store;
                (accounts, registry)
            }
            StorageBackend::Memory => {
                tracing::warn!("⚠️ Using in-memory storage; nothing will be persisted");
                let store = Arc::new(MemoryStore::new());
                let accounts: Arc<dyn AccountStore> = store.clone();
                let registry: Arc<dyn SourceRegistry> = store;
                (accounts, registry)
            }
        };

    let pipeline = RosterPipeline::new(registry.clone(), provider);
    let cache = Arc::new(RosterCache::with_ttl(pipeline, config.cache_ttl()));
    Ok(PortalService::new(cache, accounts, registry))
}

async fn run<B: RosterBuilder>(
    command: Command,
    portal: &PortalService<B>,
) -> Result<(), PortalError> {
    match command {
        Command::Refresh => {
            let roster = portal.roster(true).await;
            println!(
                "✅ Roster built at {} with {} student(s)",
                roster.built_at,
                roster.students.len()
            );
            let mut statuses: Vec<_> = roster.source_status.iter().collect();
            statuses.sort_by(|a, b| a.0.cmp(b.0));
            for (id, status) in statuses {
                match status {
                    SourceStatus::Connected { count, .. } => {
                        println!("  ✓ {}: connected ({} students)", id, count)
                    }
                    SourceStatus::Error { error, .. } => println!("  ✗ {}: {}", id, error),
                }
            }
        }
        Command::Marks { roll_no } => {
            let student = portal.marks_for_roll(&roll_no).await?;
            println!(
                "{} ({}) from {}",
                student.name, student.roll_no, student.source_label
            );
            for subject in &student.subjects {
                let obtained = subject.obtained.to_string();
                match subject.score().and_then(|s| s.percentage()) {
                    Some(pct) => println!("  {:<24} {:>10}  ({:.1}%)", subject.name, obtained, pct),
                    None => println!("  {:<24} {:>10}", subject.name, obtained),
                }
            }
        }
        Command::Check { roll_no } => {
            let registered = portal.check_registration(&roll_no).await?;
            println!(
                "{} is {}",
                roll_no,
                if registered { "registered" } else { "not registered" }
            );
        }
        Command::Health => {
            let health = portal.health().await?;
            println!("{}", serde_json::to_string_pretty(&health)?);
        }
        Command::Sources { action } => match action {
            SourcesCommand::List { owner } => {
                for view in portal.sources_for_owner(&owner).await? {
                    println!(
                        "{}  {} / {}  [{}]  {}",
                        view.source.id,
                        view.source.spreadsheet_id,
                        view.source.tab,
                        view.status_label(),
                        view.source.label()
                    );
                }
            }
            SourcesCommand::Add {
                owner,
                spreadsheet_id,
                tab,
                description,
            } => {
                let source = portal
                    .add_source(
                        &owner,
                        NewSource {
                            spreadsheet_id,
                            tab,
                            description,
                        },
                    )
                    .await?;
                println!("✅ Sheet added with id {}", source.id);
            }
            SourcesCommand::Remove { owner, id } => {
                portal.remove_source(&owner, &id).await?;
                println!("✅ Sheet {} removed", id);
            }
        },
    }
    Ok(())
}
