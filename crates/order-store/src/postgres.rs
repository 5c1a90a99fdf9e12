use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use common::{
    LineItemId, LogEntryId, OrderId, OrderNumber, OrderNumberSequenceId, PaymentId, ProductId,
    ProductNumber, ShopId, StorefrontId, UserId,
};

use crate::{
    LineItemRecord, LogEntryRecord, LogQuery, NewOrder, OrderFlag, OrderNumberSequenceRecord,
    OrderRecord, OrderUpdate, PaymentRecord, Result, StockChange, StoreError, StoredOrder,
    store::{OrderStore, validate_new_order},
};

const ORDER_COLUMNS: &str = "id, created_at, shop_id, storefront_id, order_number, placed_by_id, \
     company, first_name, last_name, country, zip_code, city, street, currency, \
     total_amount_cents, payment_method, payment_state, payment_state_updated_at, \
     payment_state_updated_by_id, cancellation_reason, invoice_created_at, \
     processing_required, processed_at";

const LINE_ITEM_COLUMNS: &str = "id, order_id, order_number, product_id, product_number, \
     product_type, name, unit_price_cents, tax_rate_basis_points, quantity, line_amount_cents, \
     processing_required, processing_result, processed_at";

/// PostgreSQL-backed order store implementation.
#[derive(Clone)]
pub struct PostgresOrderStore {
    pool: PgPool,
}

impl PostgresOrderStore {
    /// Creates a new PostgreSQL order store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        tracing::debug!("Order store migrations applied");
        Ok(())
    }

    fn row_to_sequence(row: PgRow) -> Result<OrderNumberSequenceRecord> {
        Ok(OrderNumberSequenceRecord {
            id: OrderNumberSequenceId::from_uuid(row.try_get::<Uuid, _>("id")?),
            shop_id: ShopId::new(row.try_get::<String, _>("shop_id")?),
            prefix: row.try_get("prefix")?,
            value: row.try_get("value")?,
        })
    }

    fn row_to_order(row: &PgRow) -> Result<OrderRecord> {
        Ok(OrderRecord {
            id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            created_at: row.try_get("created_at")?,
            shop_id: ShopId::new(row.try_get::<String, _>("shop_id")?),
            storefront_id: StorefrontId::new(row.try_get::<String, _>("storefront_id")?),
            order_number: OrderNumber::new(row.try_get::<String, _>("order_number")?),
            placed_by_id: UserId::from_uuid(row.try_get::<Uuid, _>("placed_by_id")?),
            company: row.try_get("company")?,
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
            country: row.try_get("country")?,
            zip_code: row.try_get("zip_code")?,
            city: row.try_get("city")?,
            street: row.try_get("street")?,
            currency: row.try_get("currency")?,
            total_amount_cents: row.try_get("total_amount_cents")?,
            payment_method: row.try_get("payment_method")?,
            payment_state: row.try_get("payment_state")?,
            payment_state_updated_at: row.try_get("payment_state_updated_at")?,
            payment_state_updated_by_id: row
                .try_get::<Option<Uuid>, _>("payment_state_updated_by_id")?
                .map(UserId::from_uuid),
            cancellation_reason: row.try_get("cancellation_reason")?,
            invoice_created_at: row.try_get("invoice_created_at")?,
            processing_required: row.try_get("processing_required")?,
            processed_at: row.try_get("processed_at")?,
        })
    }

    fn row_to_line_item(row: PgRow) -> Result<LineItemRecord> {
        Ok(LineItemRecord {
            id: LineItemId::from_uuid(row.try_get::<Uuid, _>("id")?),
            order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
            order_number: OrderNumber::new(row.try_get::<String, _>("order_number")?),
            product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
            product_number: ProductNumber::new(row.try_get::<String, _>("product_number")?),
            product_type: row.try_get("product_type")?,
            name: row.try_get("name")?,
            unit_price_cents: row.try_get("unit_price_cents")?,
            tax_rate_basis_points: row.try_get("tax_rate_basis_points")?,
            quantity: row.try_get("quantity")?,
            line_amount_cents: row.try_get("line_amount_cents")?,
            processing_required: row.try_get("processing_required")?,
            processing_result: row.try_get("processing_result")?,
            processed_at: row.try_get("processed_at")?,
        })
    }

    fn row_to_log_entry(row: PgRow) -> Result<LogEntryRecord> {
        Ok(LogEntryRecord {
            id: LogEntryId::from_uuid(row.try_get::<Uuid, _>("id")?),
            occurred_at: row.try_get("occurred_at")?,
            event_type: row.try_get("event_type")?,
            order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
            data: row.try_get("data")?,
        })
    }

    fn row_to_payment(row: PgRow) -> Result<PaymentRecord> {
        Ok(PaymentRecord {
            id: PaymentId::from_uuid(row.try_get::<Uuid, _>("id")?),
            order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
            created_at: row.try_get("created_at")?,
            method: row.try_get("method")?,
            amount_cents: row.try_get("amount_cents")?,
            currency: row.try_get("currency")?,
            additional_data: row.try_get("additional_data")?,
        })
    }

    /// Attaches line items to the given order rows, preserving row order.
    async fn with_line_items(&self, rows: Vec<PgRow>) -> Result<Vec<StoredOrder>> {
        let orders = rows
            .iter()
            .map(Self::row_to_order)
            .collect::<Result<Vec<_>>>()?;
        if orders.is_empty() {
            return Ok(Vec::new());
        }

        let order_ids: Vec<Uuid> = orders.iter().map(|o| o.id.as_uuid()).collect();
        let item_rows = sqlx::query(&format!(
            "SELECT {LINE_ITEM_COLUMNS} FROM shop_order_line_items \
             WHERE order_id = ANY($1) ORDER BY position ASC"
        ))
        .bind(order_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut items_by_order: HashMap<OrderId, Vec<LineItemRecord>> = HashMap::new();
        for row in item_rows {
            let item = Self::row_to_line_item(row)?;
            items_by_order.entry(item.order_id).or_default().push(item);
        }

        Ok(orders
            .into_iter()
            .map(|order| StoredOrder {
                line_items: items_by_order.remove(&order.id).unwrap_or_default(),
                order,
            })
            .collect())
    }

    async fn insert_log_entry(conn: &mut PgConnection, entry: &LogEntryRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO shop_order_log_entries (id, occurred_at, event_type, order_id, data)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(entry.id.as_uuid())
        .bind(entry.occurred_at)
        .bind(&entry.event_type)
        .bind(entry.order_id.as_uuid())
        .bind(&entry.data)
        .execute(conn)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_foreign_key_violation()
            {
                return StoreError::OrderNotFound(entry.order_id);
            }
            StoreError::Database(e)
        })?;
        Ok(())
    }

    async fn insert_line_item(conn: &mut PgConnection, item: &LineItemRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO shop_order_line_items (
                id, order_id, order_number, product_id, product_number, product_type, name,
                unit_price_cents, tax_rate_basis_points, quantity, line_amount_cents,
                processing_required, processing_result, processed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(item.id.as_uuid())
        .bind(item.order_id.as_uuid())
        .bind(item.order_number.as_str())
        .bind(item.product_id.as_uuid())
        .bind(item.product_number.as_str())
        .bind(&item.product_type)
        .bind(&item.name)
        .bind(item.unit_price_cents)
        .bind(item.tax_rate_basis_points)
        .bind(item.quantity)
        .bind(item.line_amount_cents)
        .bind(item.processing_required)
        .bind(&item.processing_result)
        .bind(item.processed_at)
        .execute(conn)
        .await?;
        Ok(())
    }

    async fn insert_payment(conn: &mut PgConnection, payment: &PaymentRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO shop_order_payments (id, order_id, created_at, method, amount_cents, currency, additional_data)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(payment.id.as_uuid())
        .bind(payment.order_id.as_uuid())
        .bind(payment.created_at)
        .bind(&payment.method)
        .bind(payment.amount_cents)
        .bind(&payment.currency)
        .bind(&payment.additional_data)
        .execute(conn)
        .await?;
        Ok(())
    }

    /// Sums changes per product, ordered by product ID so concurrent
    /// transactions lock stock rows in the same order.
    fn aggregate_stock_changes(changes: &[StockChange]) -> BTreeMap<ProductId, i32> {
        let mut totals = BTreeMap::new();
        for change in changes {
            *totals.entry(change.product_id).or_default() += change.quantity;
        }
        totals
    }
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
    async fn create_order_number_sequence(
        &self,
        sequence: OrderNumberSequenceRecord,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO shop_order_number_sequences (id, shop_id, prefix, value)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(sequence.id.as_uuid())
        .bind(sequence.shop_id.as_str())
        .bind(&sequence.prefix)
        .bind(sequence.value)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_order_number_sequence(
        &self,
        sequence_id: OrderNumberSequenceId,
    ) -> Result<Option<OrderNumberSequenceRecord>> {
        let row = sqlx::query(
            "SELECT id, shop_id, prefix, value FROM shop_order_number_sequences WHERE id = $1",
        )
        .bind(sequence_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_sequence).transpose()
    }

    async fn increment_order_number_sequence(
        &self,
        sequence_id: OrderNumberSequenceId,
    ) -> Result<OrderNumberSequenceRecord> {
        // Row lock taken by UPDATE serializes concurrent increments
        let row = sqlx::query(
            r#"
            UPDATE shop_order_number_sequences
            SET value = value + 1
            WHERE id = $1
            RETURNING id, shop_id, prefix, value
            "#,
        )
        .bind(sequence_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Self::row_to_sequence(row),
            None => Err(StoreError::SequenceNotFound(sequence_id)),
        }
    }

    async fn set_stock(&self, product_id: ProductId, quantity: i32) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO shop_product_stock (product_id, quantity)
            VALUES ($1, $2)
            ON CONFLICT (product_id) DO UPDATE SET quantity = EXCLUDED.quantity
            "#,
        )
        .bind(product_id.as_uuid())
        .bind(quantity)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_stock(&self, product_id: ProductId) -> Result<Option<i32>> {
        let quantity: Option<i32> =
            sqlx::query_scalar("SELECT quantity FROM shop_product_stock WHERE product_id = $1")
                .bind(product_id.as_uuid())
                .fetch_optional(&self.pool)
                .await?;

        Ok(quantity)
    }

    async fn insert_order(&self, new_order: NewOrder) -> Result<()> {
        validate_new_order(&new_order)?;

        let order = &new_order.order;
        let mut tx = self.pool.begin().await?;

        for (product_id, quantity) in Self::aggregate_stock_changes(&new_order.stock_decrements) {
            let remaining: Option<i32> = sqlx::query_scalar(
                r#"
                UPDATE shop_product_stock
                SET quantity = quantity - $2
                WHERE product_id = $1 AND quantity >= $2
                RETURNING quantity
                "#,
            )
            .bind(product_id.as_uuid())
            .bind(quantity)
            .fetch_optional(&mut *tx)
            .await?;

            if remaining.is_none() {
                let available: Option<i32> = sqlx::query_scalar(
                    "SELECT quantity FROM shop_product_stock WHERE product_id = $1",
                )
                .bind(product_id.as_uuid())
                .fetch_optional(&mut *tx)
                .await?;

                return Err(StoreError::InsufficientStock {
                    product_id,
                    requested: quantity,
                    available: available.unwrap_or(0),
                });
            }
        }

        sqlx::query(&format!(
            "INSERT INTO shop_orders ({ORDER_COLUMNS}) VALUES \
             ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, \
             $19, $20, $21, $22, $23)"
        ))
        .bind(order.id.as_uuid())
        .bind(order.created_at)
        .bind(order.shop_id.as_str())
        .bind(order.storefront_id.as_str())
        .bind(order.order_number.as_str())
        .bind(order.placed_by_id.as_uuid())
        .bind(&order.company)
        .bind(&order.first_name)
        .bind(&order.last_name)
        .bind(&order.country)
        .bind(&order.zip_code)
        .bind(&order.city)
        .bind(&order.street)
        .bind(&order.currency)
        .bind(order.total_amount_cents)
        .bind(&order.payment_method)
        .bind(&order.payment_state)
        .bind(order.payment_state_updated_at)
        .bind(order.payment_state_updated_by_id.map(|id| id.as_uuid()))
        .bind(&order.cancellation_reason)
        .bind(order.invoice_created_at)
        .bind(order.processing_required)
        .bind(order.processed_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e {
                match db_err.constraint() {
                    Some("unique_shop_order_number") => {
                        return StoreError::DuplicateOrderNumber(order.order_number.clone());
                    }
                    Some("shop_orders_pkey") => return StoreError::DuplicateOrderId(order.id),
                    _ => {}
                }
            }
            StoreError::Database(e)
        })?;

        for item in &new_order.line_items {
            Self::insert_line_item(&mut *tx, item).await?;
        }
        Self::insert_log_entry(&mut *tx, &new_order.log_entry).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn update_order(&self, update: OrderUpdate) -> Result<()> {
        let order = &update.order;
        let mut tx = self.pool.begin().await?;

        let current: Option<String> =
            sqlx::query_scalar("SELECT payment_state FROM shop_orders WHERE id = $1 FOR UPDATE")
                .bind(order.id.as_uuid())
                .fetch_optional(&mut *tx)
                .await?;

        let current = current.ok_or(StoreError::OrderNotFound(order.id))?;
        if current != update.expected_payment_state {
            metrics::counter!("shop_store_concurrency_conflicts_total").increment(1);
            tracing::warn!(
                order_id = %order.id,
                expected = %update.expected_payment_state,
                actual = %current,
                "Rejected stale order update"
            );
            return Err(StoreError::ConcurrencyConflict {
                order_id: order.id,
                expected: update.expected_payment_state.clone(),
                actual: current,
            });
        }

        sqlx::query(
            r#"
            UPDATE shop_orders SET
                payment_method = $2,
                payment_state = $3,
                payment_state_updated_at = $4,
                payment_state_updated_by_id = $5,
                cancellation_reason = $6
            WHERE id = $1
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(&order.payment_method)
        .bind(&order.payment_state)
        .bind(order.payment_state_updated_at)
        .bind(order.payment_state_updated_by_id.map(|id| id.as_uuid()))
        .bind(&order.cancellation_reason)
        .execute(&mut *tx)
        .await?;

        if let Some(payment) = &update.payment {
            Self::insert_payment(&mut *tx, payment).await?;
        }
        for entry in &update.log_entries {
            Self::insert_log_entry(&mut *tx, entry).await?;
        }
        for (product_id, quantity) in Self::aggregate_stock_changes(&update.stock_increments) {
            sqlx::query(
                r#"
                INSERT INTO shop_product_stock (product_id, quantity)
                VALUES ($1, $2)
                ON CONFLICT (product_id) DO UPDATE
                SET quantity = shop_product_stock.quantity + EXCLUDED.quantity
                "#,
            )
            .bind(product_id.as_uuid())
            .bind(quantity)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn set_order_flag(
        &self,
        order_id: OrderId,
        flag: OrderFlag,
        value: Option<DateTime<Utc>>,
        log_entry: LogEntryRecord,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(&format!(
            "UPDATE shop_orders SET {} = $2 WHERE id = $1",
            flag.column()
        ))
        .bind(order_id.as_uuid())
        .bind(value)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::OrderNotFound(order_id));
        }

        Self::insert_log_entry(&mut *tx, &log_entry).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn find_order(&self, order_id: OrderId) -> Result<Option<StoredOrder>> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM shop_orders WHERE id = $1"
        ))
        .bind(order_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        Ok(self.with_line_items(rows).await?.into_iter().next())
    }

    async fn find_order_by_number(
        &self,
        order_number: &OrderNumber,
    ) -> Result<Option<StoredOrder>> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM shop_orders WHERE order_number = $1"
        ))
        .bind(order_number.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(self.with_line_items(rows).await?.into_iter().next())
    }

    async fn get_orders_for_shop(&self, shop_id: &ShopId) -> Result<Vec<StoredOrder>> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM shop_orders WHERE shop_id = $1 \
             ORDER BY created_at DESC, order_number DESC"
        ))
        .bind(shop_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        self.with_line_items(rows).await
    }

    async fn get_orders_placed_by_user(&self, user_id: UserId) -> Result<Vec<StoredOrder>> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM shop_orders WHERE placed_by_id = $1 \
             ORDER BY created_at DESC, order_number DESC"
        ))
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        self.with_line_items(rows).await
    }

    async fn count_orders_per_payment_state(
        &self,
        shop_id: &ShopId,
    ) -> Result<HashMap<String, i64>> {
        let rows = sqlx::query(
            r#"
            SELECT payment_state, COUNT(*) AS order_count
            FROM shop_orders
            WHERE shop_id = $1
            GROUP BY payment_state
            "#,
        )
        .bind(shop_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| -> Result<(String, i64)> {
                Ok((row.try_get("payment_state")?, row.try_get("order_count")?))
            })
            .collect()
    }

    async fn update_line_item_processing_result(
        &self,
        line_item_id: LineItemId,
        processing_result: serde_json::Value,
        processed_at: DateTime<Utc>,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE shop_order_line_items
            SET processing_result = $2, processed_at = $3
            WHERE id = $1
            "#,
        )
        .bind(line_item_id.as_uuid())
        .bind(processing_result)
        .bind(processed_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::LineItemNotFound(line_item_id));
        }
        Ok(())
    }

    async fn append_log_entries(&self, entries: Vec<LogEntryRecord>) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for entry in &entries {
            Self::insert_log_entry(&mut *tx, entry).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn get_log_entries(&self, query: LogQuery) -> Result<Vec<LogEntryRecord>> {
        let mut sql = String::from(
            "SELECT id, occurred_at, event_type, order_id, data FROM shop_order_log_entries WHERE 1=1",
        );
        let mut param_count = 0;

        if query.order_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND order_id = ${param_count}"));
        }
        if query.event_types.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND event_type = ANY(${param_count})"));
        }
        if query.from_timestamp.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND occurred_at >= ${param_count}"));
        }
        if query.to_timestamp.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND occurred_at <= ${param_count}"));
        }

        sql.push_str(" ORDER BY occurred_at ASC, position ASC");

        if query.limit.is_some() {
            param_count += 1;
            sql.push_str(&format!(" LIMIT ${param_count}"));
        }
        if query.offset.is_some() {
            param_count += 1;
            sql.push_str(&format!(" OFFSET ${param_count}"));
        }

        let mut sqlx_query = sqlx::query(&sql);

        if let Some(order_id) = query.order_id {
            sqlx_query = sqlx_query.bind(order_id.as_uuid());
        }
        if let Some(event_types) = query.event_types {
            sqlx_query = sqlx_query.bind(event_types);
        }
        if let Some(from_ts) = query.from_timestamp {
            sqlx_query = sqlx_query.bind(from_ts);
        }
        if let Some(to_ts) = query.to_timestamp {
            sqlx_query = sqlx_query.bind(to_ts);
        }
        if let Some(limit) = query.limit {
            sqlx_query = sqlx_query.bind(limit as i64);
        }
        if let Some(offset) = query.offset {
            sqlx_query = sqlx_query.bind(offset as i64);
        }

        let rows = sqlx_query.fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::row_to_log_entry).collect()
    }

    async fn get_payments_for_order(&self, order_id: OrderId) -> Result<Vec<PaymentRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, order_id, created_at, method, amount_cents, currency, additional_data
            FROM shop_order_payments
            WHERE order_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(order_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_payment).collect()
    }

    async fn delete_order(&self, order_id: OrderId) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for table in [
            "shop_order_payments",
            "shop_order_log_entries",
            "shop_order_line_items",
        ] {
            sqlx::query(&format!("DELETE FROM {table} WHERE order_id = $1"))
                .bind(order_id.as_uuid())
                .execute(&mut *tx)
                .await?;
        }

        let result = sqlx::query("DELETE FROM shop_orders WHERE id = $1")
            .bind(order_id.as_uuid())
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::OrderNotFound(order_id));
        }

        tx.commit().await?;
        Ok(())
    }
}
