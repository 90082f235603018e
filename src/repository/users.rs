use crate::db::{Database, DbOperation};
use crate::error::AppError;
use crate::models::{NewUser, User};
use crate::observability::{Component, TraceContext};

const REPOSITORY: Component = Component::repository("UserRepository");
const TABLE: &str = "users";

const SELECT_ALL: &str = "SELECT id, name, email, role FROM users ORDER BY id";
const SELECT_BY_ID: &str = "SELECT id, name, email, role FROM users WHERE id = ?";
const SELECT_BY_EMAIL: &str = "SELECT id, name, email, role FROM users WHERE email = ?";
const SELECT_BY_ROLE: &str = "SELECT id, name, email, role FROM users WHERE role = ? ORDER BY id";
const SEARCH: &str = "SELECT id, name, email, role FROM users WHERE name LIKE ? OR email LIKE ? ORDER BY id";
const COUNT: &str = "SELECT COUNT(*) FROM users";
const COUNT_BY_ROLE: &str = "SELECT COUNT(*) FROM users WHERE role = ?";
const INSERT: &str = "INSERT INTO users (name, email, role) VALUES (?, ?, ?)";
const UPDATE: &str = "UPDATE users SET name = ?, email = ?, role = ? WHERE id = ?";
const DELETE: &str = "DELETE FROM users WHERE id = ?";

#[derive(Debug, Clone)]
pub struct UserRepository {
    db: Database,
}

impl UserRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn find_all(&self, cx: &TraceContext) -> Result<Vec<User>, AppError> {
        REPOSITORY
            .call(cx, "find_all", |cx| async move {
                let query = sqlx::query_as::<_, User>(SELECT_ALL).fetch_all(self.db.pool());
                Ok(self.db.tracer().trace(&cx, DbOperation::query(TABLE, SELECT_ALL), query).await?)
            })
            .await
    }

    pub async fn find_by_id(&self, cx: &TraceContext, id: i64) -> Result<Option<User>, AppError> {
        REPOSITORY
            .call(cx, "find_by_id", |cx| async move {
                let query = sqlx::query_as::<_, User>(SELECT_BY_ID)
                    .bind(id)
                    .fetch_optional(self.db.pool());
                let op = DbOperation::query(TABLE, SELECT_BY_ID).param(id);
                Ok(self.db.tracer().trace(&cx, op, query).await?)
            })
            .await
    }

    pub async fn find_by_email(&self, cx: &TraceContext, email: &str) -> Result<Option<User>, AppError> {
        REPOSITORY
            .call(cx, "find_by_email", |cx| async move {
                let query = sqlx::query_as::<_, User>(SELECT_BY_EMAIL)
                    .bind(email)
                    .fetch_optional(self.db.pool());
                let op = DbOperation::query(TABLE, SELECT_BY_EMAIL).param(email);
                Ok(self.db.tracer().trace(&cx, op, query).await?)
            })
            .await
    }

    pub async fn find_by_role(&self, cx: &TraceContext, role: &str) -> Result<Vec<User>, AppError> {
        REPOSITORY
            .call(cx, "find_by_role", |cx| async move {
                let query = sqlx::query_as::<_, User>(SELECT_BY_ROLE)
                    .bind(role)
                    .fetch_all(self.db.pool());
                let op = DbOperation::query(TABLE, SELECT_BY_ROLE).param(role);
                Ok(self.db.tracer().trace(&cx, op, query).await?)
            })
            .await
    }

    pub async fn search(&self, cx: &TraceContext, keyword: &str) -> Result<Vec<User>, AppError> {
        REPOSITORY
            .call(cx, "search", |cx| async move {
                let pattern = format!("%{}%", keyword);
                let query = sqlx::query_as::<_, User>(SEARCH)
                    .bind(&pattern)
                    .bind(&pattern)
                    .fetch_all(self.db.pool());
                let op = DbOperation::query(TABLE, SEARCH).param(&pattern).param(&pattern);
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

    pub async fn count_by_role(&self, cx: &TraceContext, role: &str) -> Result<i64, AppError> {
        REPOSITORY
            .call(cx, "count_by_role", |cx| async move {
                let query = sqlx::query_scalar::<_, i64>(COUNT_BY_ROLE)
                    .bind(role)
                    .fetch_one(self.db.pool());
                let op = DbOperation::query(TABLE, COUNT_BY_ROLE).param(role);
                Ok(self.db.tracer().trace(&cx, op, query).await?)
            })
            .await
    }

    pub async fn insert(&self, cx: &TraceContext, user: NewUser) -> Result<User, AppError> {
        REPOSITORY
            .call(cx, "insert", |cx| async move {
                let query = sqlx::query(INSERT)
                    .bind(&user.name)
                    .bind(&user.email)
                    .bind(&user.role)
                    .execute(self.db.pool());
                let op = DbOperation::update(TABLE, INSERT)
                    .param(&user.name)
                    .param(&user.email)
                    .param(&user.role);
                let result = self.db.tracer().trace(&cx, op, query).await?;

                Ok(User {
                    id: result.last_insert_rowid(),
                    name: user.name,
                    email: user.email,
                    role: user.role,
                })
            })
            .await
    }

    /// Insert every user in one transaction; nothing is stored if any insert fails.
    pub async fn insert_all(&self, cx: &TraceContext, users: Vec<NewUser>) -> Result<Vec<User>, AppError> {
        REPOSITORY
            .call(cx, "insert_all", |cx| async move {
                let pool = self.db.pool();
                let batch = async {
                    let mut tx = pool.begin().await?;
                    let mut ids = Vec::with_capacity(users.len());
                    for user in &users {
                        let result = sqlx::query(INSERT)
                            .bind(&user.name)
                            .bind(&user.email)
                            .bind(&user.role)
                            .execute(&mut *tx)
                            .await?;
                        ids.push(result.last_insert_rowid());
                    }
                    tx.commit().await?;
                    Ok::<_, sqlx::Error>(ids)
                };

                let op = DbOperation::batch_update(TABLE, INSERT, users.len());
                let ids = self.db.tracer().trace(&cx, op, batch).await?;

                Ok(ids
                    .into_iter()
                    .zip(users)
                    .map(|(id, user)| User {
                        id,
                        name: user.name,
                        email: user.email,
                        role: user.role,
                    })
                    .collect())
            })
            .await
    }

    /// Replace a user's fields. Returns `None` when no row matched.
    pub async fn update(&self, cx: &TraceContext, id: i64, user: NewUser) -> Result<Option<User>, AppError> {
        REPOSITORY
            .call(cx, "update", |cx| async move {
                let query = sqlx::query(UPDATE)
                    .bind(&user.name)
                    .bind(&user.email)
                    .bind(&user.role)
                    .bind(id)
                    .execute(self.db.pool());
                let op = DbOperation::update(TABLE, UPDATE)
                    .param(&user.name)
                    .param(&user.email)
                    .param(&user.role)
                    .param(id);
                let result = self.db.tracer().trace(&cx, op, query).await?;

                Ok((result.rows_affected() > 0).then(|| User {
                    id,
                    name: user.name,
                    email: user.email,
                    role: user.role,
                }))
            })
            .await
    }

    /// Returns whether a row was deleted.
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
