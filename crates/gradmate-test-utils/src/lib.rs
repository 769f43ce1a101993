//! Shared Postgres fixture for GradMate store integration tests.
//!
//! Set `GRADMATE_TEST_PG_URL` to reuse an already running server; otherwise
//! a container is started through testcontainers and shared by every test
//! in the binary. Each test gets a fresh, migrated database created the same
//! way `gradmate db-init` creates one.

use sqlx::{Executor, PgPool};
use testcontainers::ContainerAsync;
use testcontainers::ImageExt;
use testcontainers::runners::AsyncRunner;
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;
use uuid::Uuid;

use gradmate_db::config::DbConfig;
use gradmate_db::pool;

struct SharedPg {
    base_url: String,
    /// Keeps the container alive; `None` with an external server.
    _container: Option<ContainerAsync<Postgres>>,
}

static SHARED_PG: OnceCell<SharedPg> = OnceCell::const_new();

async fn start_container() -> SharedPg {
    let container = Postgres::default()
        .with_tag("16")
        .start()
        .await
        .expect("failed to start PostgreSQL container");
    let host = container.get_host().await.expect("failed to get host");
    let port = container
        .get_host_port_ipv4(5432)
        .await
        .expect("failed to get mapped port");
    SharedPg {
        base_url: format!("postgresql://postgres:postgres@{host}:{port}"),
        _container: Some(container),
    }
}

/// Server root URL (no database name) of the shared Postgres.
pub async fn pg_url() -> &'static str {
    let shared = SHARED_PG
        .get_or_init(|| async {
            match std::env::var("GRADMATE_TEST_PG_URL") {
                Ok(url) => SharedPg {
                    base_url: url.trim_end_matches('/').to_owned(),
                    _container: None,
                },
                Err(_) => start_container().await,
            }
        })
        .await;
    &shared.base_url
}

async fn test_db_config(db_name: &str) -> DbConfig {
    DbConfig::new(format!("{}/{db_name}", pg_url().await))
}

/// Create a uniquely named, migrated database.
///
/// Returns `(pool, db_name)`; pass `db_name` to [`drop_test_db`] afterwards.
pub async fn create_test_db() -> (PgPool, String) {
    let db_name = format!("gradmate_test_{}", Uuid::new_v4().simple());
    let config = test_db_config(&db_name).await;

    let status = pool::ensure_database_exists(&config)
        .await
        .unwrap_or_else(|e| panic!("failed to create test database {db_name}: {e:#}"));
    assert_eq!(status, pool::DatabaseStatus::Created, "{db_name} already existed");

    let db = pool::create_pool(&config)
        .await
        .unwrap_or_else(|e| panic!("failed to connect to test database {db_name}: {e:#}"));
    pool::run_migrations(&db)
        .await
        .expect("migrations should succeed");
    (db, db_name)
}

/// Drop a database created by [`create_test_db`], closing any sessions left
/// on it. Missing databases are ignored.
pub async fn drop_test_db(db_name: &str) {
    let config = test_db_config(db_name).await;
    let Ok(admin) = PgPool::connect(&config.maintenance_url()).await else {
        return;
    };
    let _ = admin
        .execute(format!("DROP DATABASE IF EXISTS \"{db_name}\" WITH (FORCE)").as_str())
        .await;
    admin.close().await;
}
