use chrono::{DateTime, SecondsFormat, Utc};

use crate::db::{Database, DbOperation};
use crate::error::AppError;
use crate::models::{NewOrder, Order, OrderStatus};
use crate::observability::{Component, TraceContext};

const REPOSITORY: Component = Component::repository("OrderRepository");
const TABLE: &str = "orders";

const SELECT_ALL: &str = "SELECT id, user_id, product_id, quantity, total_amount, status, created_at, updated_at FROM orders ORDER BY id";
const SELECT_BY_ID: &str = "SELECT id, user_id, product_id, quantity, total_amount, status, created_at, updated_at FROM orders WHERE id = ?";
const SELECT_BY_USER: &str = "SELECT id, user_id, product_id, quantity, total_amount, status, created_at, updated_at FROM orders WHERE user_id = ? ORDER BY id";
const SELECT_BY_STATUS: &str = "SELECT id, user_id, product_id, quantity, total_amount, status, created_at, updated_at FROM orders WHERE status = ? ORDER BY id";
const SELECT_HIGH_VALUE: &str = "SELECT id, user_id, product_id, quantity, total_amount, status, created_at, updated_at FROM orders WHERE total_amount > ? ORDER BY total_amount DESC";
const SELECT_BY_DATE_RANGE: &str = "SELECT id, user_id, product_id, quantity, total_amount, status, created_at, updated_at FROM orders WHERE created_at BETWEEN ? AND ? ORDER BY created_at";
const COUNT: &str = "SELECT COUNT(*) FROM orders";
const COUNT_BY_STATUS: &str = "SELECT COUNT(*) FROM orders WHERE status = ?";
const TOTAL_BY_USER: &str = "SELECT COALESCE(SUM(total_amount), 0.0) FROM orders WHERE user_id = ? AND status != 'CANCELLED'";
const REVENUE: &str = "SELECT COALESCE(SUM(total_amount), 0.0) FROM orders WHERE status != 'CANCELLED'";
const INSERT: &str = "INSERT INTO orders (user_id, product_id, quantity, total_amount, status, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)";
const UPDATE_STATUS: &str = "UPDATE orders SET status = ?, updated_at = ? WHERE id = ?";
const CANCEL: &str = "UPDATE orders SET status = 'CANCELLED', updated_at = ? WHERE id = ? AND status NOT IN ('CANCELLED', 'DELIVERED')";
const RESERVE_STOCK: &str =
    "UPDATE products SET stock_quantity = stock_quantity - ? WHERE id = ? AND stock_quantity >= ?";
const RESTORE_STOCK: &str = "UPDATE products SET stock_quantity = stock_quantity + ? WHERE id = ?";

/// Timestamps are stored as RFC 3339 text so range filters compare lexically.
fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[derive(Debug, Clone)]
pub struct OrderRepository {
    db: Database,
}

impl OrderRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn find_all(&self, cx: &TraceContext) -> Result<Vec<Order>, AppError> {
        REPOSITORY
            .call(cx, "find_all", |cx| async move {
                let query = sqlx::query_as::<_, Order>(SELECT_ALL).fetch_all(self.db.pool());
                Ok(self.db.tracer().trace(&cx, DbOperation::query(TABLE, SELECT_ALL), query).await?)
            })
            .await
    }

    pub async fn find_by_id(&self, cx: &TraceContext, id: i64) -> Result<Option<Order>, AppError> {
        REPOSITORY
            .call(cx, "find_by_id", |cx| async move {
                let query = sqlx::query_as::<_, Order>(SELECT_BY_ID)
                    .bind(id)
                    .fetch_optional(self.db.pool());
                let op = DbOperation::query(TABLE, SELECT_BY_ID).param(id);
                Ok(self.db.tracer().trace(&cx, op, query).await?)
            })
            .await
    }

    pub async fn find_by_user(&self, cx: &TraceContext, user_id: i64) -> Result<Vec<Order>, AppError> {
        REPOSITORY
            .call(cx, "find_by_user", |cx| async move {
                let query = sqlx::query_as::<_, Order>(SELECT_BY_USER)
                    .bind(user_id)
                    .fetch_all(self.db.pool());
                let op = DbOperation::query(TABLE, SELECT_BY_USER).param(user_id);
                Ok(self.db.tracer().trace(&cx, op, query).await?)
            })
            .await
    }

    pub async fn find_by_status(&self, cx: &TraceContext, status: OrderStatus) -> Result<Vec<Order>, AppError> {
        REPOSITORY
            .call(cx, "find_by_status", |cx| async move {
                let query = sqlx::query_as::<_, Order>(SELECT_BY_STATUS)
                    .bind(status.as_str())
                    .fetch_all(self.db.pool());
                let op = DbOperation::query(TABLE, SELECT_BY_STATUS).param(status);
                Ok(self.db.tracer().trace(&cx, op, query).await?)
            })
            .await
    }

    /// Orders whose total is strictly above `threshold`, largest first.
    pub async fn find_high_value(&self, cx: &TraceContext, threshold: f64) -> Result<Vec<Order>, AppError> {
        REPOSITORY
            .call(cx, "find_high_value", |cx| async move {
                let query = sqlx::query_as::<_, Order>(SELECT_HIGH_VALUE)
                    .bind(threshold)
                    .fetch_all(self.db.pool());
                let op = DbOperation::query(TABLE, SELECT_HIGH_VALUE).param(threshold);
                Ok(self.db.tracer().trace(&cx, op, query).await?)
            })
            .await
    }

    pub async fn find_by_date_range(
        &self,
        cx: &TraceContext,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Order>, AppError> {
        REPOSITORY
            .call(cx, "find_by_date_range", |cx| async move {
                let (start, end) = (timestamp(&start), timestamp(&end));
                let query = sqlx::query_as::<_, Order>(SELECT_BY_DATE_RANGE)
                    .bind(&start)
                    .bind(&end)
                    .fetch_all(self.db.pool());
                let op = DbOperation::query(TABLE, SELECT_BY_DATE_RANGE).param(&start).param(&end);
                Ok(self.db.tracer().trace(&cx, op, query).await?)
            })
            .await
    }

    pub async fn count(&self, cx: &TraceContext) -> Result<i64, AppError> {
        REPOSITORY
            .call(cx, "count", |cx| async move {
                let query = sqlx::query_scalar::<_, i64>(COUNT).fetch_one(self.db.pool());
                Ok(self.db.tracer().trace(&cx, DbOperation::query(TABLE, COUNT), query).await?)
            })
            .await
    }

    pub async fn count_by_status(&self, cx: &TraceContext, status: OrderStatus) -> Result<i64, AppError> {
        REPOSITORY
            .call(cx, "count_by_status", |cx| async move {
                let query = sqlx::query_scalar::<_, i64>(COUNT_BY_STATUS)
                    .bind(status.as_str())
                    .fetch_one(self.db.pool());
                let op = DbOperation::query(TABLE, COUNT_BY_STATUS).param(status);
                Ok(self.db.tracer().trace(&cx, op, query).await?)
            })
            .await
    }

    /// Amount spent by a user, cancelled orders excluded.
    pub async fn total_by_user(&self, cx: &TraceContext, user_id: i64) -> Result<f64, AppError> {
        REPOSITORY
            .call(cx, "total_by_user", |cx| async move {
                let query = sqlx::query_scalar::<_, f64>(TOTAL_BY_USER)
                    .bind(user_id)
                    .fetch_one(self.db.pool());
                let op = DbOperation::query(TABLE, TOTAL_BY_USER).param(user_id);
                Ok(self.db.tracer().trace(&cx, op, query).await?)
            })
            .await
    }

    pub async fn revenue(&self, cx: &TraceContext) -> Result<f64, AppError> {
        REPOSITORY
            .call(cx, "revenue", |cx| async move {
                let query = sqlx::query_scalar::<_, f64>(REVENUE).fetch_one(self.db.pool());
                Ok(self.db.tracer().trace(&cx, DbOperation::query(TABLE, REVENUE), query).await?)
            })
            .await
    }

    /// Take the order's quantity out of stock and insert the order, in one
    /// transaction. Returns `None`, with nothing written, when the product
    /// no longer has enough stock.
    pub async fn insert_reserving_stock(
        &self,
        cx: &TraceContext,
        order: NewOrder,
        total_amount: f64,
    ) -> Result<Option<Order>, AppError> {
        REPOSITORY
            .call(cx, "insert_reserving_stock", |cx| async move {
                let now = Utc::now();
                let created_at = timestamp(&now);
                let status = OrderStatus::Pending;

                let pool = self.db.pool();
                let place = async {
                    let mut tx = pool.begin().await?;
                    let reserved = sqlx::query(RESERVE_STOCK)
                        .bind(order.quantity)
                        .bind(order.product_id)
                        .bind(order.quantity)
                        .execute(&mut *tx)
                        .await?;
                    if reserved.rows_affected() == 0 {
                        tx.rollback().await?;
                        return Ok::<_, sqlx::Error>(None);
                    }

                    let inserted = sqlx::query(INSERT)
                        .bind(order.user_id)
                        .bind(order.product_id)
                        .bind(order.quantity)
                        .bind(total_amount)
                        .bind(status.as_str())
                        .bind(&created_at)
                        .bind(&created_at)
                        .execute(&mut *tx)
                        .await?;
                    tx.commit().await?;
                    Ok(Some(inserted.last_insert_rowid()))
                };

                let op = DbOperation::batch_update(TABLE, INSERT, 2);
                let id = self.db.tracer().trace(&cx, op, place).await?;

                Ok(id.map(|id| Order {
                    id,
                    user_id: order.user_id,
                    product_id: order.product_id,
                    quantity: order.quantity,
                    total_amount,
                    status,
                    created_at: now,
                    updated_at: now,
                }))
            })
            .await
    }

    /// Mark an order cancelled and put its quantity back in stock, in one
    /// transaction. Returns `false`, with nothing written, when the order is
    /// missing or already cancelled or delivered.
    pub async fn cancel_restoring_stock(&self, cx: &TraceContext, order: &Order) -> Result<bool, AppError> {
        REPOSITORY
            .call(cx, "cancel_restoring_stock", |cx| async move {
                let updated_at = timestamp(&Utc::now());

                let pool = self.db.pool();
                let cancel = async {
                    let mut tx = pool.begin().await?;
                    let cancelled = sqlx::query(CANCEL)
                        .bind(&updated_at)
                        .bind(order.id)
                        .execute(&mut *tx)
                        .await?;
                    if cancelled.rows_affected() == 0 {
                        tx.rollback().await?;
                        return Ok::<_, sqlx::Error>(None);
                    }

                    sqlx::query(RESTORE_STOCK)
                        .bind(order.quantity)
                        .bind(order.product_id)
                        .execute(&mut *tx)
                        .await?;
                    tx.commit().await?;
                    Ok(Some(order.id))
                };

                let op = DbOperation::batch_update(TABLE, CANCEL, 2);
                Ok(self.db.tracer().trace(&cx, op, cancel).await?.is_some())
            })
            .await
    }

    /// Returns whether a row matched.
    pub async fn update_status(&self, cx: &TraceContext, id: i64, status: OrderStatus) -> Result<bool, AppError> {
        REPOSITORY
            .call(cx, "update_status", |cx| async move {
                let updated_at = timestamp(&Utc::now());
                let query = sqlx::query(UPDATE_STATUS)
                    .bind(status.as_str())
                    .bind(&updated_at)
                    .bind(id)
                    .execute(self.db.pool());
                let op = DbOperation::update(TABLE, UPDATE_STATUS)
                    .param(status)
                    .param(&updated_at)
                    .param(id);
                let result = self.db.tracer().trace(&cx, op, query).await?;
                Ok(result.rows_affected() > 0)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timestamps_sort_lexically() {
        let early = Utc.with_ymd_and_hms(2024, 7, 1, 9, 30, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2024, 7, 10, 8, 0, 0).unwrap();

        assert_eq!(timestamp(&early), "2024-07-01T09:30:00Z");
        assert!(timestamp(&early) < timestamp(&late));
    }
}
