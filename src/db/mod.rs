pub mod models;
pub mod repository;

pub use models::{Event, EventInput, EventRow};
pub use repository::EventRepository;

/// Fresh in-memory database with migrations applied. A single connection is
/// used because each `sqlite::memory:` connection is its own database.
#[cfg(test)]
pub async fn test_pool() -> sqlx::SqlitePool {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("migrations");
    pool
}
