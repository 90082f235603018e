//! Persistence subsystem.
//!
//! # Data Flow
//! ```text
//! repository method
//!     → tracer.rs (db.<operation> client span, sanitized statement)
//!     → sqlx SqlitePool
//!     → result or sqlx::Error returned unchanged to the repository
//! ```
//!
//! # Design Decisions
//! - SQLite through sqlx; in-memory databases are pinned to one pooled
//!   connection that never idles out, otherwise the data would vanish
//! - Schema is created on connect; demo data is optional

pub mod tracer;

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

use crate::config::DatabaseConfig;

pub use tracer::{DbOperation, DbTracer, OperationKind, RowCount};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    email TEXT NOT NULL UNIQUE,
    role TEXT NOT NULL DEFAULT 'USER'
);

CREATE TABLE IF NOT EXISTS products (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    description TEXT,
    price REAL NOT NULL,
    stock_quantity INTEGER NOT NULL,
    category TEXT
);

CREATE TABLE IF NOT EXISTS orders (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id),
    product_id INTEGER NOT NULL REFERENCES products(id),
    quantity INTEGER NOT NULL,
    total_amount REAL NOT NULL,
    status TEXT NOT NULL DEFAULT 'PENDING',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#;

const SEED: &str = r#"
INSERT INTO users (name, email, role) VALUES
    ('Alice Johnson', 'alice@example.com', 'ADMIN'),
    ('Bob Smith', 'bob@example.com', 'USER'),
    ('Carol White', 'carol@example.com', 'MANAGER'),
    ('Dave Brown', 'dave@example.com', 'EMPLOYEE'),
    ('Eve Davis', 'eve@example.com', 'USER');

INSERT INTO products (name, description, price, stock_quantity, category) VALUES
    ('Laptop', '14 inch ultrabook', 1299.99, 50, 'electronics'),
    ('Smartphone', '6.1 inch display', 799.99, 120, 'electronics'),
    ('T-Shirt', 'Cotton crew neck', 19.99, 300, 'clothing'),
    ('Novel', 'Paperback fiction', 14.99, 80, 'books'),
    ('Headphones', 'Noise cancelling', 99.99, 100, 'electronics'),
    ('Jeans', 'Slim fit denim', 49.99, 60, 'clothing'),
    ('Cookbook', 'Weeknight recipes', 24.99, 5, 'books');

INSERT INTO orders (user_id, product_id, quantity, total_amount, status, created_at, updated_at) VALUES
    (1, 1, 1, 1299.99, 'DELIVERED', '2024-06-01T10:00:00Z', '2024-06-05T10:00:00Z'),
    (2, 3, 2, 39.98, 'PENDING', '2024-07-01T09:30:00Z', '2024-07-01T09:30:00Z'),
    (3, 5, 1, 99.99, 'SHIPPED', '2024-07-02T14:15:00Z', '2024-07-03T08:00:00Z'),
    (5, 4, 3, 44.97, 'CONFIRMED', '2024-07-03T16:45:00Z', '2024-07-03T17:00:00Z');
"#;

/// Pool plus the tracer every repository runs its statements through.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
    tracer: DbTracer,
}

impl Database {
    /// Connect, create the schema and optionally seed demo data.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(&config.url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let max_connections = if config.is_in_memory() {
            1
        } else {
            config.max_connections
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        sqlx::raw_sql(SCHEMA).execute(&pool).await?;

        if config.seed_demo_data {
            let users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
                .fetch_one(&pool)
                .await?;
            if users == 0 {
                sqlx::raw_sql(SEED).execute(&pool).await?;
                tracing::info!("Demo data seeded");
            }
        }

        tracing::info!(
            url = %config.url,
            max_connections,
            "Database ready"
        );

        Ok(Self {
            pool,
            tracer: DbTracer::new("sqlite", config.name.clone()),
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn tracer(&self) -> &DbTracer {
        &self.tracer
    }

    /// Cheap liveness check.
    pub async fn ping(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await.map(|_| ())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
