use cafe_ledger::{
    config::{self, database},
    console,
    core::{
        Ledger,
        catalog::StaticCatalog,
        events::{Notice, Scope},
    },
    errors::Result,
};
use dotenvy::dotenv;
use std::{env, sync::Arc};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    // 2. Load .env file; env vars can also be set externally
    dotenv().ok();

    // 3. Ledger rules and menu
    let config_path = env::var("LEDGER_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
    let ledger_config = config::ledger::load_or_default(&config_path)
        .inspect_err(|e| error!("Failed to load {}: {}", config_path, e))?;
    let catalog = StaticCatalog::from_menu(&ledger_config.menu);
    if catalog.is_empty() {
        warn!("Menu is empty; checkout will reject every cart");
    }

    // 4. Database
    let db = database::create_connection()
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    database::create_tables(&db)
        .await
        .inspect(|()| info!("Database initialized successfully."))
        .inspect_err(|e| error!("Failed to initialize database: {}", e))?;

    let ledger = Ledger::new(db, ledger_config, Arc::new(catalog));

    // 5. Kitchen queue watcher
    let mut orders = ledger.subscribe(Scope::AllOrders);
    tokio::spawn(async move {
        while let Some(notice) = orders.next().await {
            match notice {
                Notice::Changed(event) => info!(?event, "Order queue changed"),
                Notice::Resync => warn!("Order watcher fell behind, reload the queue"),
            }
        }
    });

    // 6. Staff console on stdin
    info!("Staff console ready, type `help` for commands");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        if matches!(line.trim(), "quit" | "exit") {
            break;
        }
        let reply = console::handle_line(&ledger, &line).await;
        stdout.write_all(format!("{reply}\n").as_bytes()).await?;
        stdout.flush().await?;
    }

    info!("Console closed");
    Ok(())
}
