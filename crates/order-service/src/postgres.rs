//! PostgreSQL-backed saga history.

use async_trait::async_trait;
use common::{OrderId, TransactionId};
use saga::Event;
use sqlx::{PgPool, Row, postgres::PgRow};

use crate::error::StoreResult;
use crate::repository::EventRepository;

/// PostgreSQL event repository; events are stored whole as `jsonb`.
#[derive(Clone)]
pub struct PostgresEventRepository {
    pool: PgPool,
}

impl PostgresEventRepository {
    /// Creates a new repository over a connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects to `database_url`.
    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> StoreResult<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_event(row: PgRow) -> StoreResult<Event> {
        let json: serde_json::Value = row.try_get("event")?;
        Ok(serde_json::from_value(json)?)
    }

    async fn fetch_latest(&self, column: &str, value: &str) -> StoreResult<Option<Event>> {
        // `column` is always one of the two indexed id columns.
        let sql = format!(
            "SELECT event FROM saga_events WHERE {column} = $1 ORDER BY created_at DESC LIMIT 1"
        );
        let row = sqlx::query(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::row_to_event).transpose()
    }
}

#[async_trait]
impl EventRepository for PostgresEventRepository {
    async fn save(&self, event: &Event) -> StoreResult<()> {
        let json = serde_json::to_value(event)?;

        sqlx::query(
            r#"
            INSERT INTO saga_events (id, order_id, transaction_id, source, status, created_at, event)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE SET
                order_id = EXCLUDED.order_id,
                transaction_id = EXCLUDED.transaction_id,
                source = EXCLUDED.source,
                status = EXCLUDED.status,
                created_at = EXCLUDED.created_at,
                event = EXCLUDED.event
            "#,
        )
        .bind(event.id.as_uuid())
        .bind(event.order_id.as_str())
        .bind(event.transaction_id.as_str())
        .bind(event.source.map(|s| s.as_str()))
        .bind(event.status.map(|s| s.as_str()))
        .bind(event.created_at)
        .bind(json)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_all(&self) -> StoreResult<Vec<Event>> {
        let rows = sqlx::query("SELECT event FROM saga_events ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Self::row_to_event).collect()
    }

    async fn find_latest_by_order_id(&self, order_id: &OrderId) -> StoreResult<Option<Event>> {
        self.fetch_latest("order_id", order_id.as_str()).await
    }

    async fn find_latest_by_transaction_id(
        &self,
        transaction_id: &TransactionId,
    ) -> StoreResult<Option<Event>> {
        self.fetch_latest("transaction_id", transaction_id.as_str())
            .await
    }
}
