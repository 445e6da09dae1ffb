use diesel_async::pooled_connection::deadpool::{BuildError, Pool};
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::AsyncPgConnection;

pub type DbPool = Pool<AsyncPgConnection>;

/// Build the Diesel async connection pool.
///
/// Connections are opened lazily on first checkout, so building the pool
/// never touches the database.
pub fn build(database_url: &str, max_size: usize) -> Result<DbPool, BuildError> {
    let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(database_url);
    let pool = Pool::builder(manager).max_size(max_size).build()?;

    tracing::info!(max_size, "database pool created");

    Ok(pool)
}
