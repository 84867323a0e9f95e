use sqlx::postgres::PgPoolOptions;
use std::{
    net::SocketAddr,
    num::ParseIntError,
    sync::Arc,
    time::Instant,
};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use trackboard_api::{
    config::Env,
    import::{ProviderRegistry, TrackImporter, soundcloud::SoundCloudProvider},
    pages::ViewAggregator,
    server::{self, ServerState, StartedAt},
};
use trackboard_common::{
    clock::{Clock, SystemClock},
    session::{AdminList, SessionAuthenticator},
    snowflake::{GeneratorOrigin, SnowflakeError},
};
use trackboard_db::{DbError, client::DbClient, memory::MemoryStore, repository::Repository};

#[derive(Debug, Error)]
enum InitError {
    #[error("Error parsing .env file: {0}")]
    Dotenv(#[from] dotenvy::Error),
    #[error("Error parsing environment: {0}")]
    Envy(#[from] envy::Error),
    #[error("Error parsing ADMIN_USER_IDS: {0}")]
    AdminIds(#[from] ParseIntError),
    #[error("Invalid snowflake origin: {0}")]
    SnowflakeOrigin(#[from] SnowflakeError),
    #[error("Error connecting to the database: {0}")]
    DbConnect(sqlx::Error),
    #[error("Error migrating the database: {0}")]
    DbMigrate(#[from] DbError),
    #[error("Error building the provider client: {0}")]
    ProviderClient(#[from] reqwest::Error),
    #[error("Error binding tcp listener: {0}")]
    TcpBind(std::io::Error),
    #[error("Error serving server: {0}")]
    TcpServe(std::io::Error),
}

fn install_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "trackboard_api=debug,\
                trackboard_common=debug,\
                trackboard_db=debug,\
                tower_http=debug,axum::rejection=trace,sqlx=info"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn get_env() -> Result<Env, InitError> {
    if let Err(e) = dotenvy::dotenv() {
        if e.not_found() {
            debug!("No .dotenv file found");
        } else {
            return Err(e.into());
        }
    }

    envy::from_env().map_err(InitError::from)
}

async fn connect_repository(
    env: &Env,
    origin: GeneratorOrigin,
    clock: Arc<dyn Clock>,
) -> Result<Arc<dyn Repository>, InitError> {
    let Some(database_url) = &env.database_url else {
        warn!("DATABASE_URL is not set, data is kept in memory only");
        return Ok(Arc::new(MemoryStore::new(origin, clock)));
    };

    let pool = PgPoolOptions::new()
        .connect(database_url)
        .await
        .map_err(InitError::DbConnect)?;
    let client = DbClient::new(pool, origin, clock);
    client.migrate().await?;
    info!("Database migrated");

    Ok(Arc::new(client))
}

fn provider_registry(env: &Env) -> Result<ProviderRegistry, InitError> {
    let mut registry = ProviderRegistry::new();
    match &env.soundcloud_client_id {
        Some(client_id) => registry.register(Arc::new(SoundCloudProvider::new(
            &env.soundcloud_api_url,
            client_id.clone(),
            env.provider_timeout(),
        )?)),
        None => warn!("SOUNDCLOUD_CLIENT_ID is not set, track imports are disabled"),
    }

    Ok(registry)
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "Could not listen for the shutdown signal");
    }
    info!("Shutting down");
}

#[tokio::main]
async fn main() -> Result<(), InitError> {
    let started_at = StartedAt(Instant::now());
    install_tracing();
    let env = get_env()?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let origin = GeneratorOrigin::new(env.snowflake_worker_id, env.snowflake_process_id)?;
    let repository = connect_repository(&env, origin, Arc::clone(&clock)).await?;

    let importer = TrackImporter::new(
        provider_registry(&env)?,
        Arc::clone(&repository),
        Arc::clone(&clock),
    );
    let state = ServerState {
        authenticator: Arc::new(SessionAuthenticator::new(
            env.session_secret.as_bytes(),
            Arc::clone(&clock),
        )),
        permissions: Arc::new(AdminList::new(env.admin_user_ids()?)),
        importer: Arc::new(importer),
        pages: ViewAggregator::new(Arc::clone(&repository), env.site_settings()),
        repository,
        started_at,
    };

    let server_address = SocketAddr::new(env.server_address, env.server_port);
    let listener = tokio::net::TcpListener::bind(server_address)
        .await
        .map_err(InitError::TcpBind)?;
    info!(%server_address, "Listening");

    axum::serve(listener, server::app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(InitError::TcpServe)?;

    Ok(())
}
