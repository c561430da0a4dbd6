//! Server wiring: pool, migrations, services and the HTTP listener

use crate::api;
use crate::auth::JwtKeys;
use crate::config::Config;
use crate::db_migration;
use crate::domains::core::identifier::IdentifierCodec;
use crate::domains::participant::repository::SqliteParticipantRepository;
use crate::domains::participant::service::{ParticipantService, ParticipantServiceImpl};
use crate::domains::project::repository::{ProjectRepository, SqliteProjectRepository};
use crate::errors::{DomainError, ServiceError, ServiceResult};
use axum::Router;
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::signal;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<Config>,

    /// Connection pool, also used by the health check
    pub pool: SqlitePool,

    pub participants: Arc<dyn ParticipantService>,

    pub projects: Arc<dyn ProjectRepository>,

    /// Bearer token verification keys
    pub jwt: JwtKeys,
}

impl AppState {
    /// Assemble services on top of an already migrated pool
    pub fn new(config: Config, pool: SqlitePool) -> ServiceResult<Self> {
        let codec = IdentifierCodec::new(&config.hashid_salt, config.hashid_min_length)?;
        let jwt = JwtKeys::new(&config.jwt_secret)?;

        let projects: Arc<dyn ProjectRepository> = Arc::new(SqliteProjectRepository::new(pool.clone()));
        let participant_repo = Arc::new(SqliteParticipantRepository::new(pool.clone()));
        let participants = Arc::new(ParticipantServiceImpl::new(
            pool.clone(),
            participant_repo,
            projects.clone(),
            codec,
        ));

        Ok(Self {
            config: Arc::new(config),
            pool,
            participants,
            projects,
            jwt,
        })
    }
}

/// Main server structure
pub struct Server {
    config: Arc<Config>,
    app: Router,
}

impl Server {
    /// Connect, migrate and build the router
    pub async fn new(config: Config) -> ServiceResult<Self> {
        log::info!("[SERVER] Initializing prim_engine");

        let pool = db_migration::connect_pool(&config.database_url, config.max_connections).await?;
        db_migration::initialize_database(&pool).await?;

        let state = AppState::new(config, pool)?;
        let config = state.config.clone();
        let app = api::router(state);

        Ok(Self { config, app })
    }

    /// Run the server until shutdown signal
    pub async fn run(self) -> ServiceResult<()> {
        let addr = self.config.bind_address;

        let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
            ServiceError::Configuration(format!("Failed to bind to address {}: {}", addr, e))
        })?;

        log::info!("[SERVER] Listening on {}", addr);

        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| ServiceError::Domain(DomainError::Internal(format!("Server error: {}", e))))?;

        log::info!("[SERVER] Shut down");
        Ok(())
    }
}

/// Shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            log::error!("[SERVER] Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                log::error!("[SERVER] Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    log::info!("[SERVER] Shutdown signal received");
}
