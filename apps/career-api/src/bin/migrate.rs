//! Standalone migration runner for career-api.
//!
//! Usage:
//!   cargo run -p career-api --bin career-migrate
//!   cargo run -p career-api --bin career-migrate -- --test
//!   cargo run -p career-api --bin career-migrate -- --revert
//!
//! Reads DATABASE_URL from the environment (or .env via dotenvy).

use std::path::Path;

use diesel::pg::PgConnection;
use diesel::Connection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("./migrations");

fn main() {
    if dotenvy::dotenv().is_err() {
        let env_path = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(env_path);
    }

    let args: Vec<String> = std::env::args().skip(1).collect();
    let test_db = args.iter().any(|arg| arg == "--test");
    let revert = args.iter().any(|arg| arg == "--revert");

    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL env var is required");
    let database_url = if test_db {
        with_test_db_suffix(&database_url)
    } else {
        database_url
    };

    println!("Connecting to database...");
    let mut conn = PgConnection::establish(&database_url).expect("failed to connect to database");

    if revert {
        let reverted = conn
            .revert_last_migration(MIGRATIONS)
            .expect("failed to revert migration");
        println!("Reverted: {reverted}");
        return;
    }

    println!("Running pending migrations...");
    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .expect("failed to run migrations");

    if applied.is_empty() {
        println!("No pending migrations.");
    } else {
        for migration in &applied {
            println!("  Applied: {migration}");
        }
        println!("{} migration(s) applied.", applied.len());
    }
}

/// `postgres://h/career?x=y` becomes `postgres://h/career_test?x=y`.
fn with_test_db_suffix(database_url: &str) -> String {
    let (base, query) = match database_url.split_once('?') {
        Some((base, query)) => (base, Some(query)),
        None => (database_url, None),
    };
    let Some((prefix, db_name)) = base.rsplit_once('/') else {
        return database_url.to_string();
    };
    if db_name.is_empty() || db_name.ends_with("_test") {
        return database_url.to_string();
    }

    let mut updated = format!("{prefix}/{db_name}_test");
    if let Some(query) = query {
        updated.push('?');
        updated.push_str(query);
    }
    updated
}

#[cfg(test)]
mod tests {
    use super::with_test_db_suffix;

    #[test]
    fn test_suffix_is_appended_once() {
        assert_eq!(
            with_test_db_suffix("postgres://u:p@localhost/career"),
            "postgres://u:p@localhost/career_test"
        );
        assert_eq!(
            with_test_db_suffix("postgres://localhost/career?sslmode=disable"),
            "postgres://localhost/career_test?sslmode=disable"
        );
        assert_eq!(
            with_test_db_suffix("postgres://localhost/career_test"),
            "postgres://localhost/career_test"
        );
    }
}
