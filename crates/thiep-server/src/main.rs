use std::net::SocketAddr;
use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use thiep_api::auth::{AppState, AppStateInner};
use thiep_core::config::Config;
use thiep_core::identity::LocalIdentity;
use thiep_core::ports::{Directory, Notifier};
use thiep_core::relay::{DisabledNotifier, EmailRelay};
use thiep_core::send::CardSender;
use thiep_core::store::SqliteDirectory;
use thiep_db::Database;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "thiep=debug,tower_http=debug".into()),
        )
        .init();

    // Config (loads .env if present)
    let config = Config::from_env()?;

    // Init database
    let db = Arc::new(Database::open(&config.db_path)?);
    let directory: Arc<dyn Directory> = Arc::new(SqliteDirectory::new(db.clone()));

    let notifier: Arc<dyn Notifier> = match config.relay.clone() {
        Some(relay) => {
            info!("Email relay enabled via {}", relay.endpoint);
            Arc::new(EmailRelay::new(relay))
        }
        None => {
            warn!("THIEP_RELAY_SERVICE_ID not set, email notifications are disabled");
            Arc::new(DisabledNotifier)
        }
    };

    // Shared state
    let app_state: AppState = Arc::new(AppStateInner {
        directory: directory.clone(),
        identity: LocalIdentity::new(db),
        sender: CardSender::new(directory, notifier, config.origin.clone()),
        jwt_secret: config.jwt_secret.clone(),
    });

    let app = thiep_api::router(app_state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Thiep server listening on {} (links point at {})", addr, config.origin);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
