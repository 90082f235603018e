use tracing::Instrument;

use crate::error::AppError;
use crate::models::product::MAX_PRODUCT_PRICE;
use crate::models::{NewProduct, Product};
use crate::observability::metrics::{self, Entity};
use crate::observability::{Component, TraceContext};
use crate::repository::ProductRepository;
use crate::services::Simulator;

const SERVICE: Component = Component::service("ProductService");

fn duplicate_name(err: AppError) -> AppError {
    match err {
        AppError::DataIntegrity(_) => AppError::DuplicateProduct("Product with this name already exists".into()),
        other => other,
    }
}

#[derive(Debug, Clone)]
pub struct ProductService {
    repository: ProductRepository,
    simulator: Simulator,
}

impl ProductService {
    pub fn new(repository: ProductRepository, simulator: Simulator) -> Self {
        Self { repository, simulator }
    }

    pub async fn list(&self, cx: &TraceContext) -> Result<Vec<Product>, AppError> {
        SERVICE
            .call(cx, "list", |cx| async move {
                self.simulator.delay().await;
                let products = self.repository.find_all(&cx).await?;
                metrics::set_entity_count(Entity::Products, products.len() as i64);
                Ok(products)
            })
            .await
    }

    pub async fn get(&self, cx: &TraceContext, id: i64) -> Result<Product, AppError> {
        SERVICE
            .call(cx, "get", |cx| async move {
                match id {
                    999 => return Err(AppError::IndexOutOfBounds { index: 5, len: 3 }),
                    998 => return Err(AppError::NullReference("Cannot upper-case a missing product name".into())),
                    _ => {}
                }

                self.simulator.delay().await;
                self.repository
                    .find_by_id(&cx, id)
                    .await?
                    .ok_or_else(|| AppError::product_not_found(id))
            })
            .await
    }

    pub async fn create(&self, cx: &TraceContext, product: NewProduct) -> Result<Product, AppError> {
        SERVICE
            .call(cx, "create", |cx| async move {
                if product.name.trim().is_empty() {
                    return Err(AppError::Validation("Product name is required".into()));
                }
                if product.price <= 0.0 {
                    return Err(AppError::InvalidPrice("Product price must be greater than 0".into()));
                }
                if product.stock_quantity < 0 {
                    return Err(AppError::Validation("Stock quantity cannot be negative".into()));
                }

                if self.repository.find_by_name(&cx, &product.name).await?.is_some() {
                    return Err(AppError::DuplicateProduct(format!(
                        "Product with name '{}' already exists",
                        product.name
                    )));
                }

                if product.name.to_lowercase().contains("dberror") {
                    return Err(AppError::DatabaseConnection(
                        "Database connection failed while creating product".into(),
                    ));
                }

                self.simulator.delay().await;
                let created = self.repository.insert(&cx, product).await.map_err(duplicate_name)?;

                metrics::adjust_entity_count(Entity::Products, 1);
                tracing::info!(product.id = created.id, product.name = %created.name, "Product created");
                Ok(created)
            })
            .await
    }

    /// Run `create` on a background task under this call's context.
    pub async fn create_in_background(&self, cx: &TraceContext, product: NewProduct) -> Result<Product, AppError> {
        SERVICE
            .call(cx, "create_in_background", |cx| async move {
                let service = self.clone();
                let task = tokio::spawn(async move { service.create(&cx, product).await }.in_current_span());

                task.await
                    .map_err(|err| AppError::Internal(format!("Background product creation failed: {}", err)))?
            })
            .await
    }

    pub async fn update(&self, cx: &TraceContext, id: i64, product: NewProduct) -> Result<Product, AppError> {
        SERVICE
            .call(cx, "update", |cx| async move {
                if self.repository.find_by_id(&cx, id).await?.is_none() {
                    return Err(AppError::product_not_found(id));
                }
                if product.price > MAX_PRODUCT_PRICE {
                    return Err(AppError::BusinessLogic("Product price cannot exceed $10,000".into()));
                }

                self.simulator.delay().await;
                self.repository
                    .update(&cx, id, product)
                    .await
                    .map_err(duplicate_name)?
                    .ok_or_else(|| AppError::product_not_found(id))
            })
            .await
    }

    pub async fn delete(&self, cx: &TraceContext, id: i64) -> Result<(), AppError> {
        SERVICE
            .call(cx, "delete", |cx| async move {
                self.simulator.delay().await;
                if !self.repository.delete(&cx, id).await? {
                    return Err(AppError::product_not_found(id));
                }
                metrics::adjust_entity_count(Entity::Products, -1);
                Ok(())
            })
            .await
    }

    pub async fn list_by_category(&self, cx: &TraceContext, category: &str) -> Result<Vec<Product>, AppError> {
        SERVICE
            .call(cx, "list_by_category", |cx| async move {
                if category.eq_ignore_ascii_case("timeout") {
                    self.simulator.timeout_delay().await;
                    return Err(AppError::Timeout("Operation timed out".into()));
                }

                self.simulator.delay().await;
                self.repository.find_by_category(&cx, category).await
            })
            .await
    }

    pub async fn count_by_category(&self, cx: &TraceContext, category: &str) -> Result<i64, AppError> {
        SERVICE
            .call(cx, "count_by_category", |cx| async move {
                self.simulator.delay().await;
                self.repository.count_by_category(&cx, category).await
            })
            .await
    }

    pub async fn search(&self, cx: &TraceContext, keyword: &str) -> Result<Vec<Product>, AppError> {
        SERVICE
            .call(cx, "search", |cx| async move {
                if keyword.trim().is_empty() {
                    return Err(AppError::Validation("Search keyword cannot be empty".into()));
                }
                self.simulator.delay().await;
                self.repository.search(&cx, keyword.trim()).await
            })
            .await
    }

    pub async fn list_by_price_range(&self, cx: &TraceContext, min: f64, max: f64) -> Result<Vec<Product>, AppError> {
        SERVICE
            .call(cx, "list_by_price_range", |cx| async move {
                if min > max {
                    return Err(AppError::InvalidPrice(
                        "Minimum price cannot be greater than maximum price".into(),
                    ));
                }
                self.simulator.delay().await;
                self.repository.find_by_price_range(&cx, min, max).await
            })
            .await
    }

    pub async fn list_low_stock(&self, cx: &TraceContext, threshold: i64) -> Result<Vec<Product>, AppError> {
        SERVICE
            .call(cx, "list_low_stock", |cx| async move {
                self.simulator.delay().await;
                self.repository.find_low_stock(&cx, threshold).await
            })
            .await
    }

    /// Add `quantity` (possibly negative) to a product's stock.
    pub async fn adjust_stock(&self, cx: &TraceContext, id: i64, quantity: i64) -> Result<Product, AppError> {
        SERVICE
            .call(cx, "adjust_stock", |cx| async move {
                let mut product = self
                    .repository
                    .find_by_id(&cx, id)
                    .await?
                    .ok_or_else(|| AppError::product_not_found(id))?;

                let Some(stock) = product.stock_quantity.checked_add(quantity) else {
                    return Err(AppError::Validation("Stock adjustment is out of range".into()));
                };
                if stock < 0 {
                    return Err(AppError::InsufficientStock("Insufficient stock available".into()));
                }

                self.simulator.delay().await;
                let stock = self
                    .repository
                    .adjust_stock(&cx, id, quantity)
                    .await?
                    .ok_or_else(|| AppError::InsufficientStock("Insufficient stock available".into()))?;
                product.stock_quantity = stock;
                tracing::info!(product.id = id, stock, "Stock updated");
                Ok(product)
            })
            .await
    }

    pub async fn recommendations(&self, cx: &TraceContext, id: i64) -> Result<String, AppError> {
        SERVICE
            .call(cx, "recommendations", |cx| async move {
                if self.repository.find_by_id(&cx, id).await?.is_none() {
                    return Err(AppError::product_not_found(id));
                }

                self.simulator.slow_delay().await;
                if self.simulator.fails(self.simulator.config().recommendation_failure_rate) {
                    return Err(AppError::ExternalService(
                        "Recommendation service is currently unavailable".into(),
                    ));
                }
                Ok("Recommended products: [1, 2, 3]".to_string())
            })
            .await
    }
}
