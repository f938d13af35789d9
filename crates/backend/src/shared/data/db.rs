use sea_orm::{Database, DatabaseConnection};

/// Application state injected into handlers.
///
/// The connection wraps the process-wide pool; constructing it once in main
/// and passing it through axum state keeps the pool an explicit dependency
/// and lets tests substitute a `MockDatabase` connection.
#[derive(Clone)]
pub struct AppState {
    pub db: std::sync::Arc<DatabaseConnection>,
}

/// Connect to the reporting store. The store is read-only for this service;
/// no migrations are run.
pub async fn connect(url: &str) -> anyhow::Result<DatabaseConnection> {
    tracing::info!("Connecting to reporting store");
    let db = Database::connect(url).await?;
    Ok(db)
}
