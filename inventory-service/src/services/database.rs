//! PostgreSQL store for inventory-service.

use async_trait::async_trait;
use rust_decimal::Decimal;
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::models::{
    CreateItem, InventoryAlert, InventoryItem, InventoryTransaction, ItemCategory, NewAlert,
    StockMovement, TransactionFilter, TransactionType,
};
use crate::services::error::InventoryError;
use crate::services::metrics::DB_QUERY_DURATION;
use crate::services::store::InventoryStore;

macro_rules! item_columns {
    () => {
        "item_id, name, category, current_stock, initial_stock, minimum_stock, unit, \
         cost_per_unit, supplier, notes, last_restocked_utc, created_utc, updated_utc"
    };
}

macro_rules! transaction_select {
    () => {
        "SELECT t.transaction_id, t.item_id, i.name AS item_name, t.transaction_type, t.quantity, \
         t.cost_total, t.notes, t.employee_id, t.task_id, t.created_utc \
         FROM inventory_transactions t JOIN inventory_items i ON i.item_id = t.item_id"
    };
}

macro_rules! alert_select {
    () => {
        "SELECT a.alert_id, a.item_id, i.name AS item_name, i.unit, a.alert_type, \
         a.threshold_value, a.current_value, a.resolved, a.created_utc, a.resolved_utc \
         FROM inventory_alerts a JOIN inventory_items i ON i.item_id = a.item_id"
    };
}

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "inventory-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }
}

fn persistence(context: &str, err: sqlx::Error) -> InventoryError {
    InventoryError::Persistence(anyhow::anyhow!("{}: {}", context, err))
}

#[async_trait]
impl InventoryStore for Database {
    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), InventoryError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| persistence("Health check failed", e))?;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Items
    // -------------------------------------------------------------------------

    #[instrument(skip(self, input), fields(name = %input.name, category = %input.category))]
    async fn create_item(&self, input: &CreateItem) -> Result<InventoryItem, InventoryError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_item"])
            .start_timer();

        let item = sqlx::query_as::<_, InventoryItem>(concat!(
            "INSERT INTO inventory_items (item_id, name, category, current_stock, initial_stock, \
             minimum_stock, unit, cost_per_unit, supplier, notes) \
             VALUES ($1, $2, $3, $4, $4, $5, $6, $7, $8, $9) RETURNING ",
            item_columns!()
        ))
        .bind(Uuid::new_v4())
        .bind(&input.name)
        .bind(input.category.as_str())
        .bind(input.initial_stock)
        .bind(input.minimum_stock)
        .bind(&input.unit)
        .bind(input.cost_per_unit)
        .bind(&input.supplier)
        .bind(&input.notes)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| persistence("Failed to create inventory item", e))?;

        timer.observe_duration();
        info!(item_id = %item.item_id, "Inventory item created");
        Ok(item)
    }

    #[instrument(skip(self), fields(item_id = %item_id))]
    async fn get_item(&self, item_id: Uuid) -> Result<Option<InventoryItem>, InventoryError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_item"])
            .start_timer();

        let item = sqlx::query_as::<_, InventoryItem>(concat!(
            "SELECT ",
            item_columns!(),
            " FROM inventory_items WHERE item_id = $1"
        ))
        .bind(item_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| persistence("Failed to get inventory item", e))?;

        timer.observe_duration();
        Ok(item)
    }

    #[instrument(skip(self))]
    async fn list_items(
        &self,
        category: Option<ItemCategory>,
    ) -> Result<Vec<InventoryItem>, InventoryError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_items"])
            .start_timer();

        let items = sqlx::query_as::<_, InventoryItem>(concat!(
            "SELECT ",
            item_columns!(),
            " FROM inventory_items \
             WHERE ($1::VARCHAR IS NULL OR category = $1) \
             ORDER BY name, created_utc"
        ))
        .bind(category.map(|c| c.as_str()))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| persistence("Failed to list inventory items", e))?;

        timer.observe_duration();
        Ok(items)
    }

    // -------------------------------------------------------------------------
    // Ledger
    // -------------------------------------------------------------------------

    #[instrument(
        skip(self, movement),
        fields(
            item_id = %movement.item_id,
            transaction_type = %movement.transaction_type,
            quantity = %movement.quantity
        )
    )]
    async fn apply_movement(
        &self,
        movement: &StockMovement,
    ) -> Result<InventoryItem, InventoryError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["apply_movement"])
            .start_timer();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| persistence("Failed to begin transaction", e))?;

        // Floor check and write in the same statement.
        let item = sqlx::query_as::<_, InventoryItem>(concat!(
            "UPDATE inventory_items \
             SET current_stock = current_stock + $2, \
                 last_restocked_utc = CASE WHEN $3 THEN NOW() ELSE last_restocked_utc END, \
                 updated_utc = NOW() \
             WHERE item_id = $1 AND current_stock + $2 >= 0 RETURNING ",
            item_columns!()
        ))
        .bind(movement.item_id)
        .bind(movement.quantity)
        .bind(movement.transaction_type == TransactionType::Restock)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| persistence("Failed to update stock", e))?;

        let item = match item {
            Some(item) => item,
            None => {
                let available = sqlx::query_scalar::<_, Decimal>(
                    "SELECT current_stock FROM inventory_items WHERE item_id = $1",
                )
                .bind(movement.item_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| persistence("Failed to read stock", e))?;

                return Err(match available {
                    Some(available) => InventoryError::InsufficientStock { available },
                    None => InventoryError::NotFound("Inventory item"),
                });
            }
        };

        sqlx::query(
            r#"
            INSERT INTO inventory_transactions (
                transaction_id, item_id, transaction_type, quantity, cost_total,
                notes, employee_id, task_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(movement.item_id)
        .bind(movement.transaction_type.as_str())
        .bind(movement.quantity)
        .bind(movement.cost_total)
        .bind(&movement.notes)
        .bind(movement.employee_id)
        .bind(movement.task_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| persistence("Failed to append inventory transaction", e))?;

        tx.commit()
            .await
            .map_err(|e| persistence("Failed to commit stock movement", e))?;

        timer.observe_duration();
        info!(
            item_id = %item.item_id,
            current_stock = %item.current_stock,
            "Stock movement recorded"
        );
        Ok(item)
    }

    #[instrument(skip(self))]
    async fn list_transactions(
        &self,
        filter: TransactionFilter,
    ) -> Result<Vec<InventoryTransaction>, InventoryError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_transactions"])
            .start_timer();

        let transactions = sqlx::query_as::<_, InventoryTransaction>(concat!(
            transaction_select!(),
            " WHERE ($1::UUID IS NULL OR t.item_id = $1) \
             ORDER BY t.created_utc DESC \
             LIMIT $2"
        ))
        .bind(filter.item_id)
        .bind(filter.limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| persistence("Failed to list inventory transactions", e))?;

        timer.observe_duration();
        Ok(transactions)
    }

    #[instrument(skip(self), fields(item_id = %item_id))]
    async fn transaction_sum(&self, item_id: Uuid) -> Result<Decimal, InventoryError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["transaction_sum"])
            .start_timer();

        let sum = sqlx::query_scalar::<_, Decimal>(
            "SELECT COALESCE(SUM(quantity), 0) FROM inventory_transactions WHERE item_id = $1",
        )
        .bind(item_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| persistence("Failed to sum inventory transactions", e))?;

        timer.observe_duration();
        Ok(sum)
    }

    // -------------------------------------------------------------------------
    // Alerts
    // -------------------------------------------------------------------------

    #[instrument(skip(self, input), fields(item_id = %input.item_id, alert_type = %input.alert_type))]
    async fn create_stock_alert(
        &self,
        input: &NewAlert,
    ) -> Result<Option<InventoryAlert>, InventoryError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_stock_alert"])
            .start_timer();

        let alert_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO inventory_alerts (alert_id, item_id, alert_type, threshold_value, current_value)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (item_id) WHERE resolved = FALSE AND alert_type IN ('low_stock', 'out_of_stock')
            DO NOTHING
            RETURNING alert_id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(input.item_id)
        .bind(input.alert_type.as_str())
        .bind(input.threshold_value)
        .bind(input.current_value)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| persistence("Failed to create inventory alert", e))?;

        timer.observe_duration();

        match alert_id {
            Some(alert_id) => {
                info!(alert_id = %alert_id, "Inventory alert raised");
                self.get_alert(alert_id).await
            }
            None => Ok(None),
        }
    }

    #[instrument(skip(self), fields(alert_id = %alert_id))]
    async fn get_alert(&self, alert_id: Uuid) -> Result<Option<InventoryAlert>, InventoryError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_alert"])
            .start_timer();

        let alert = sqlx::query_as::<_, InventoryAlert>(concat!(
            alert_select!(),
            " WHERE a.alert_id = $1"
        ))
        .bind(alert_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| persistence("Failed to get inventory alert", e))?;

        timer.observe_duration();
        Ok(alert)
    }

    #[instrument(skip(self))]
    async fn list_active_alerts(&self) -> Result<Vec<InventoryAlert>, InventoryError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_active_alerts"])
            .start_timer();

        let alerts = sqlx::query_as::<_, InventoryAlert>(concat!(
            alert_select!(),
            " WHERE a.resolved = FALSE ORDER BY a.created_utc DESC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| persistence("Failed to list inventory alerts", e))?;

        timer.observe_duration();
        Ok(alerts)
    }

    #[instrument(skip(self), fields(alert_id = %alert_id))]
    async fn resolve_alert(
        &self,
        alert_id: Uuid,
    ) -> Result<Option<InventoryAlert>, InventoryError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["resolve_alert"])
            .start_timer();

        let resolved = sqlx::query(
            "UPDATE inventory_alerts SET resolved = TRUE, resolved_utc = NOW() \
             WHERE alert_id = $1 AND resolved = FALSE",
        )
        .bind(alert_id)
        .execute(&self.pool)
        .await
        .map_err(|e| persistence("Failed to resolve inventory alert", e))?;

        timer.observe_duration();
        if resolved.rows_affected() > 0 {
            info!(alert_id = %alert_id, "Inventory alert resolved");
        }
        self.get_alert(alert_id).await
    }
}
