use serde::Serialize;
use tracing::Instrument;

use crate::error::AppError;
use crate::models::user::SUPER_ADMIN;
use crate::models::{NewUser, User};
use crate::observability::metrics::{self, Entity};
use crate::observability::{Component, TraceContext};
use crate::repository::UserRepository;
use crate::services::Simulator;

const SERVICE: Component = Component::service("UserService");

/// Account details shown on the profile endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: String,
    pub account_status: &'static str,
    pub last_login: &'static str,
    pub created_at: &'static str,
}

#[derive(Debug, Clone)]
pub struct UserService {
    repository: UserRepository,
    simulator: Simulator,
}

impl UserService {
    pub fn new(repository: UserRepository, simulator: Simulator) -> Self {
        Self { repository, simulator }
    }

    pub async fn list(&self, cx: &TraceContext) -> Result<Vec<User>, AppError> {
        SERVICE
            .call(cx, "list", |cx| async move {
                self.simulator.delay().await;
                if self.simulator.fails(self.simulator.config().user_list_failure_rate) {
                    return Err(AppError::DatabaseConnection(
                        "Database connection timeout while fetching users".into(),
                    ));
                }

                let users = self.repository.find_all(&cx).await?;
                metrics::set_entity_count(Entity::Users, users.len() as i64);
                Ok(users)
            })
            .await
    }

    pub async fn get(&self, cx: &TraceContext, id: i64) -> Result<User, AppError> {
        SERVICE
            .call(cx, "get", |cx| async move {
                match id {
                    999 => return Err(AppError::IndexOutOfBounds { index: 10, len: 5 }),
                    998 => return Err(AppError::NullReference("Cannot read length of a missing name".into())),
                    997 => return Err(AppError::RateLimit("Rate limit exceeded for user lookup".into())),
                    _ => {}
                }

                self.simulator.delay().await;
                let user = self.repository.find_by_id(&cx, id).await?;
                match user {
                    Some(user) => Ok(user),
                    None => {
                        tracing::warn!(user.id = id, "User not found by id");
                        Err(AppError::user_not_found(id))
                    }
                }
            })
            .await
    }

    pub async fn get_by_email(&self, cx: &TraceContext, email: &str) -> Result<User, AppError> {
        SERVICE
            .call(cx, "get_by_email", |cx| async move {
                if email.to_lowercase().contains("dberror") {
                    return Err(AppError::DatabaseConnection(
                        "Database connection failed for email lookup".into(),
                    ));
                }

                self.simulator.delay().await;
                self.repository
                    .find_by_email(&cx, email)
                    .await?
                    .ok_or_else(|| AppError::UserNotFound(format!("User not found with email: {}", email)))
            })
            .await
    }

    pub async fn list_by_role(&self, cx: &TraceContext, role: &str) -> Result<Vec<User>, AppError> {
        SERVICE
            .call(cx, "list_by_role", |cx| async move {
                self.simulator.delay().await;
                self.repository.find_by_role(&cx, role).await
            })
            .await
    }

    pub async fn count_by_role(&self, cx: &TraceContext, role: &str) -> Result<i64, AppError> {
        SERVICE
            .call(cx, "count_by_role", |cx| async move {
                self.simulator.delay().await;
                self.repository.count_by_role(&cx, role).await
            })
            .await
    }

    pub async fn search(&self, cx: &TraceContext, keyword: &str) -> Result<Vec<User>, AppError> {
        SERVICE
            .call(cx, "search", |cx| async move {
                if keyword.trim().is_empty() {
                    return Err(AppError::Validation("Search keyword cannot be empty".into()));
                }

                self.simulator.delay().await;
                let users = self.repository.search(&cx, keyword.trim()).await?;
                tracing::info!(search.keyword = keyword, user.count = users.len(), "User search completed");
                Ok(users)
            })
            .await
    }

    pub async fn profile(&self, cx: &TraceContext, id: i64) -> Result<UserProfile, AppError> {
        SERVICE
            .call(cx, "profile", |cx| async move {
                let user = self
                    .repository
                    .find_by_id(&cx, id)
                    .await?
                    .ok_or_else(|| AppError::user_not_found(id))?;

                Ok(UserProfile {
                    id: user.id,
                    name: user.name,
                    email: user.email,
                    role: user.role,
                    account_status: "ACTIVE",
                    last_login: "2024-07-05T10:30:00",
                    created_at: "2024-01-01T00:00:00",
                })
            })
            .await
    }

    pub async fn create(&self, cx: &TraceContext, user: NewUser) -> Result<User, AppError> {
        SERVICE
            .call(cx, "create", |cx| async move {
                user.check().map_err(|msg| AppError::Validation(msg.into()))?;

                if self.repository.find_by_email(&cx, &user.email).await?.is_some() {
                    tracing::warn!(user.email = %user.email, "Duplicate email rejected");
                    return Err(AppError::DuplicateEmail(format!(
                        "User with email '{}' already exists",
                        user.email
                    )));
                }

                let email = user.email.to_lowercase();
                if email.contains("dberror") {
                    return Err(AppError::DatabaseConnection(
                        "Database connection failed while creating user".into(),
                    ));
                }
                if email.contains("timeout") {
                    return Err(AppError::Timeout("Request timeout while creating user".into()));
                }
                if email.contains("external") {
                    return Err(AppError::ExternalService(
                        "External service unavailable for user validation".into(),
                    ));
                }

                if user.name.to_lowercase().contains("admin") && user.role != "ADMIN" {
                    return Err(AppError::BusinessLogic(
                        "Users with 'admin' in name must have ADMIN role".into(),
                    ));
                }

                self.simulator.delay().await;
                let created = self.repository.insert(&cx, user).await.map_err(|err| match err {
                    AppError::DataIntegrity(_) => AppError::DuplicateEmail("User with this email already exists".into()),
                    other => other,
                })?;

                metrics::adjust_entity_count(Entity::Users, 1);
                tracing::info!(user.id = created.id, user.email = %created.email, "User created");
                Ok(created)
            })
            .await
    }

    /// Run `create` on a background task and wait for it.
    ///
    /// The task receives this call's context, so its spans join the
    /// request's trace.
    pub async fn create_in_background(&self, cx: &TraceContext, user: NewUser) -> Result<User, AppError> {
        SERVICE
            .call(cx, "create_in_background", |cx| async move {
                let service = self.clone();
                let task = tokio::spawn(async move { service.create(&cx, user).await }.in_current_span());

                task.await
                    .map_err(|err| AppError::Internal(format!("Background user creation failed: {}", err)))?
            })
            .await
    }

    pub async fn update(&self, cx: &TraceContext, id: i64, user: NewUser) -> Result<User, AppError> {
        SERVICE
            .call(cx, "update", |cx| async move {
                if self.repository.find_by_id(&cx, id).await?.is_none() {
                    return Err(AppError::user_not_found(id));
                }
                if user.role == SUPER_ADMIN {
                    return Err(AppError::BusinessLogic(
                        "SUPER_ADMIN role cannot be assigned through this API".into(),
                    ));
                }

                self.simulator.delay().await;
                let email = user.email.clone();
                self.repository
                    .update(&cx, id, user)
                    .await
                    .map_err(|err| match err {
                        AppError::DataIntegrity(_) => {
                            AppError::DuplicateEmail(format!("User with email '{}' already exists", email))
                        }
                        other => other,
                    })?
                    .ok_or_else(|| AppError::user_not_found(id))
            })
            .await
    }

    pub async fn delete(&self, cx: &TraceContext, id: i64) -> Result<(), AppError> {
        SERVICE
            .call(cx, "delete", |cx| async move {
                self.simulator.delay().await;
                if !self.repository.delete(&cx, id).await? {
                    return Err(AppError::user_not_found(id));
                }
                metrics::adjust_entity_count(Entity::Users, -1);
                Ok(())
            })
            .await
    }

    /// Validate every user, then insert them all in one transaction.
    pub async fn create_batch(&self, cx: &TraceContext, users: Vec<NewUser>) -> Result<Vec<User>, AppError> {
        SERVICE
            .call(cx, "create_batch", |cx| async move {
                for user in &users {
                    user.check()
                        .map_err(|msg| AppError::Validation(format!("Validation failed for user: {}", msg)))?;
                }

                let batch_size = users.len();
                self.simulator.delay().await;
                let created = self.repository.insert_all(&cx, users).await.map_err(|err| match err {
                    AppError::DataIntegrity(_) => {
                        AppError::DuplicateEmail("One or more users have duplicate email addresses".into())
                    }
                    other => other,
                })?;

                metrics::adjust_entity_count(Entity::Users, created.len() as i64);
                tracing::info!(user.batch_size = batch_size, "User batch created");
                Ok(created)
            })
            .await
    }
}
