use crate::db::{Database, DbOperation};
use crate::error::AppError;
use crate::models::{NewProduct, Product};
use crate::observability::{Component, TraceContext};

const REPOSITORY: Component = Component::repository("ProductRepository");
const TABLE: &str = "products";

const SELECT_ALL: &str =
    "SELECT id, name, description, price, stock_quantity, category FROM products ORDER BY id";
const SELECT_BY_ID: &str =
    "SELECT id, name, description, price, stock_quantity, category FROM products WHERE id = ?";
const SELECT_BY_NAME: &str =
    "SELECT id, name, description, price, stock_quantity, category FROM products WHERE name = ?";
const SELECT_BY_CATEGORY: &str = "SELECT id, name, description, price, stock_quantity, category FROM products WHERE category = ? ORDER BY id";
const SEARCH: &str = "SELECT id, name, description, price, stock_quantity, category FROM products WHERE name LIKE ? OR description LIKE ? ORDER BY id";
const SELECT_BY_PRICE_RANGE: &str = "SELECT id, name, description, price, stock_quantity, category FROM products WHERE price BETWEEN ? AND ? ORDER BY price";
const SELECT_LOW_STOCK: &str = "SELECT id, name, description, price, stock_quantity, category FROM products WHERE stock_quantity < ? ORDER BY stock_quantity";
const COUNT: &str = "SELECT COUNT(*) FROM products";
const COUNT_BY_CATEGORY: &str = "SELECT COUNT(*) FROM products WHERE category = ?";
const COUNT_LOW_STOCK: &str = "SELECT COUNT(*) FROM products WHERE stock_quantity < ?";
const INVENTORY_VALUE: &str = "SELECT COALESCE(SUM(price * stock_quantity), 0.0) FROM products";
const INSERT: &str = "INSERT INTO products (name, description, price, stock_quantity, category) VALUES (?, ?, ?, ?, ?)";
const UPDATE: &str = "UPDATE products SET name = ?, description = ?, price = ?, stock_quantity = ?, category = ? WHERE id = ?";
const ADJUST_STOCK: &str = "UPDATE products SET stock_quantity = stock_quantity + ? WHERE id = ? AND stock_quantity + ? >= 0 RETURNING stock_quantity";
const DELETE: &str = "DELETE FROM products WHERE id = ?";

fn or_null(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("NULL")
}

#[derive(Debug, Clone)]
pub struct ProductRepository {
    db: Database,
}

impl ProductRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn find_all(&self, cx: &TraceContext) -> Result<Vec<Product>, AppError> {
        REPOSITORY
            .call(cx, "find_all", |cx| async move {
                let query = sqlx::query_as::<_, Product>(SELECT_ALL).fetch_all(self.db.pool());
                Ok(self.db.tracer().trace(&cx, DbOperation::query(TABLE, SELECT_ALL), query).await?)
            })
            .await
    }

    pub async fn find_by_id(&self, cx: &TraceContext, id: i64) -> Result<Option<Product>, AppError> {
        REPOSITORY
            .call(cx, "find_by_id", |cx| async move {
                let query = sqlx::query_as::<_, Product>(SELECT_BY_ID)
                    .bind(id)
                    .fetch_optional(self.db.pool());
                let op = DbOperation::query(TABLE, SELECT_BY_ID).param(id);
                Ok(self.db.tracer().trace(&cx, op, query).await?)
            })
            .await
    }

    pub async fn find_by_name(&self, cx: &TraceContext, name: &str) -> Result<Option<Product>, AppError> {
        REPOSITORY
            .call(cx, "find_by_name", |cx| async move {
                let query = sqlx::query_as::<_, Product>(SELECT_BY_NAME)
                    .bind(name)
                    .fetch_optional(self.db.pool());
                let op = DbOperation::query(TABLE, SELECT_BY_NAME).param(name);
                Ok(self.db.tracer().trace(&cx, op, query).await?)
            })
            .await
    }

    pub async fn find_by_category(&self, cx: &TraceContext, category: &str) -> Result<Vec<Product>, AppError> {
        REPOSITORY
            .call(cx, "find_by_category", |cx| async move {
                let query = sqlx::query_as::<_, Product>(SELECT_BY_CATEGORY)
                    .bind(category)
                    .fetch_all(self.db.pool());
                let op = DbOperation::query(TABLE, SELECT_BY_CATEGORY).param(category);
                Ok(self.db.tracer().trace(&cx, op, query).await?)
            })
            .await
    }

    pub async fn search(&self, cx: &TraceContext, keyword: &str) -> Result<Vec<Product>, AppError> {
        REPOSITORY
            .call(cx, "search", |cx| async move {
                let pattern = format!("%{}%", keyword);
                let query = sqlx::query_as::<_, Product>(SEARCH)
                    .bind(&pattern)
                    .bind(&pattern)
                    .fetch_all(self.db.pool());
                let op = DbOperation::query(TABLE, SEARCH).param(&pattern).param(&pattern);
                Ok(self.db.tracer().trace(&cx, op, query).await?)
            })
            .await
    }

    pub async fn find_by_price_range(&self, cx: &TraceContext, min: f64, max: f64) -> Result<Vec<Product>, AppError> {
        REPOSITORY
            .call(cx, "find_by_price_range", |cx| async move {
                let query = sqlx::query_as::<_, Product>(SELECT_BY_PRICE_RANGE)
                    .bind(min)
                    .bind(max)
                    .fetch_all(self.db.pool());
                let op = DbOperation::query(TABLE, SELECT_BY_PRICE_RANGE).param(min).param(max);
                Ok(self.db.tracer().trace(&cx, op, query).await?)
            })
            .await
    }

    /// Products whose stock is strictly below `threshold`.
    pub async fn find_low_stock(&self, cx: &TraceContext, threshold: i64) -> Result<Vec<Product>, AppError> {
        REPOSITORY
            .call(cx, "find_low_stock", |cx| async move {
                let query = sqlx::query_as::<_, Product>(SELECT_LOW_STOCK)
                    .bind(threshold)
                    .fetch_all(self.db.pool());
                let op = DbOperation::query(TABLE, SELECT_LOW_STOCK).param(threshold);
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

    pub async fn count_by_category(&self, cx: &TraceContext, category: &str) -> Result<i64, AppError> {
        REPOSITORY
            .call(cx, "count_by_category", |cx| async move {
                let query = sqlx::query_scalar::<_, i64>(COUNT_BY_CATEGORY)
                    .bind(category)
                    .fetch_one(self.db.pool());
                let op = DbOperation::query(TABLE, COUNT_BY_CATEGORY).param(category);
                Ok(self.db.tracer().trace(&cx, op, query).await?)
            })
            .await
    }

    pub async fn count_low_stock(&self, cx: &TraceContext, threshold: i64) -> Result<i64, AppError> {
        REPOSITORY
            .call(cx, "count_low_stock", |cx| async move {
                let query = sqlx::query_scalar::<_, i64>(COUNT_LOW_STOCK)
                    .bind(threshold)
                    .fetch_one(self.db.pool());
                let op = DbOperation::query(TABLE, COUNT_LOW_STOCK).param(threshold);
                Ok(self.db.tracer().trace(&cx, op, query).await?)
            })
            .await
    }

    /// Sum of price × stock over every product.
    pub async fn inventory_value(&self, cx: &TraceContext) -> Result<f64, AppError> {
        REPOSITORY
            .call(cx, "inventory_value", |cx| async move {
                let query = sqlx::query_scalar::<_, f64>(INVENTORY_VALUE).fetch_one(self.db.pool());
                Ok(self
                    .db
                    .tracer()
                    .trace(&cx, DbOperation::query(TABLE, INVENTORY_VALUE), query)
                    .await?)
            })
            .await
    }

    pub async fn insert(&self, cx: &TraceContext, product: NewProduct) -> Result<Product, AppError> {
        REPOSITORY
            .call(cx, "insert", |cx| async move {
                let query = sqlx::query(INSERT)
                    .bind(&product.name)
                    .bind(&product.description)
                    .bind(product.price)
                    .bind(product.stock_quantity)
                    .bind(&product.category)
                    .execute(self.db.pool());
                let op = DbOperation::update(TABLE, INSERT)
                    .param(&product.name)
                    .param(or_null(&product.description))
                    .param(product.price)
                    .param(product.stock_quantity)
                    .param(or_null(&product.category));
                let result = self.db.tracer().trace(&cx, op, query).await?;

                Ok(Product {
                    id: result.last_insert_rowid(),
                    name: product.name,
                    description: product.description,
                    price: product.price,
                    stock_quantity: product.stock_quantity,
                    category: product.category,
                })
            })
            .await
    }

    /// Replace a product's fields. Returns `None` when no row matched.
    pub async fn update(&self, cx: &TraceContext, id: i64, product: NewProduct) -> Result<Option<Product>, AppError> {
        REPOSITORY
            .call(cx, "update", |cx| async move {
                let query = sqlx::query(UPDATE)
                    .bind(&product.name)
                    .bind(&product.description)
                    .bind(product.price)
                    .bind(product.stock_quantity)
                    .bind(&product.category)
                    .bind(id)
                    .execute(self.db.pool());
                let op = DbOperation::update(TABLE, UPDATE)
                    .param(&product.name)
                    .param(or_null(&product.description))
                    .param(product.price)
                    .param(product.stock_quantity)
                    .param(or_null(&product.category))
                    .param(id);
                let result = self.db.tracer().trace(&cx, op, query).await?;

                Ok((result.rows_affected() > 0).then(|| Product {
                    id,
                    name: product.name,
                    description: product.description,
                    price: product.price,
                    stock_quantity: product.stock_quantity,
                    category: product.category,
                }))
            })
            .await
    }

    /// Add `delta` to the stock level in a single statement. Returns the new
    /// level, or `None` when no row matched or the level would go negative.
    pub async fn adjust_stock(&self, cx: &TraceContext, id: i64, delta: i64) -> Result<Option<i64>, AppError> {
        REPOSITORY
            .call(cx, "adjust_stock", |cx| async move {
                let query = sqlx::query_scalar::<_, i64>(ADJUST_STOCK)
                    .bind(delta)
                    .bind(id)
                    .bind(delta)
                    .fetch_optional(self.db.pool());
                let op = DbOperation::update(TABLE, ADJUST_STOCK).param(delta).param(id).param(delta);
                Ok(self.db.tracer().trace(&cx, op, query).await?)
            })
            .await
    }

    pub async fn delete(&self, cx: &TraceContext, id: i64) -> Result<bool, AppError> {
        REPOSITORY
            .call(cx, "delete", |cx| async move {
                let query = sqlx::query(DELETE).bind(id).execute(self.db.pool());
                let op = DbOperation::update(TABLE, DELETE).param(id);
                let result = self.db.tracer().trace(&cx, op, query).await?;
                Ok(result.rows_affected() > 0)
            })
            .await
    }
}

