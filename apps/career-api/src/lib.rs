pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod models;
pub mod routes;

use std::sync::Arc;

use career_common::SnowflakeGenerator;
use config::Config;
use db::directory::UserDirectory;
use db::pool::DbPool;
use gateway::dispatch::EventDispatcher;
use gateway::registry::ConnectionRegistry;
use tokio::task::JoinHandle;

/// Shared application state available to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub users: Arc<dyn UserDirectory>,
    pub config: Arc<Config>,
    pub snowflake: Arc<SnowflakeGenerator>,
    pub connections: Arc<ConnectionRegistry>,
    pub events: EventDispatcher,
}

impl AppState {
    /// Build the state and start the event dispatcher worker.
    ///
    /// Must be called inside a Tokio runtime. The returned handle finishes
    /// once every clone of the state has been dropped.
    ///
    /// # Panics
    ///
    /// If `config.worker_id` is outside the snowflake worker range.
    /// [`Config::from_env`] already rejects such values.
    pub fn new(
        config: Config,
        db: DbPool,
        users: Arc<dyn UserDirectory>,
    ) -> (Self, JoinHandle<()>) {
        let snowflake = SnowflakeGenerator::new(config.worker_id)
            .unwrap_or_else(|| panic!("worker id {} out of range", config.worker_id));
        let connections = Arc::new(ConnectionRegistry::new());
        let (events, dispatcher) = EventDispatcher::spawn(Arc::clone(&connections));

        let state = Self {
            db,
            users,
            config: Arc::new(config),
            snowflake: Arc::new(snowflake),
            connections,
            events,
        };
        (state, dispatcher)
    }
}
