use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::AppError;
use crate::models::order::MAX_ORDER_TOTAL;
use crate::models::{NewOrder, Order, OrderStatus};
use crate::observability::metrics::{self, Entity};
use crate::observability::{Component, TraceContext};
use crate::repository::{OrderRepository, ProductRepository, UserRepository};
use crate::services::Simulator;

const SERVICE: Component = Component::service("OrderService");

/// Outcome of a successful payment.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentReceipt {
    pub transaction_id: String,
    pub status: &'static str,
}

#[derive(Debug, Clone)]
pub struct OrderService {
    orders: OrderRepository,
    users: UserRepository,
    products: ProductRepository,
    simulator: Simulator,
}

impl OrderService {
    pub fn new(
        orders: OrderRepository,
        users: UserRepository,
        products: ProductRepository,
        simulator: Simulator,
    ) -> Self {
        Self {
            orders,
            users,
            products,
            simulator,
        }
    }

    pub async fn list(&self, cx: &TraceContext) -> Result<Vec<Order>, AppError> {
        SERVICE
            .call(cx, "list", |cx| async move {
                self.simulator.slow_delay().await;
                let orders = self.orders.find_all(&cx).await?;
                metrics::set_entity_count(Entity::Orders, orders.len() as i64);
                Ok(orders)
            })
            .await
    }

    pub async fn get(&self, cx: &TraceContext, id: i64) -> Result<Order, AppError> {
        SERVICE
            .call(cx, "get", |cx| async move {
                if id == 997 {
                    return Err(AppError::RateLimit("Too many requests. Please try again later.".into()));
                }

                self.simulator.slow_delay().await;
                self.orders
                    .find_by_id(&cx, id)
                    .await?
                    .ok_or_else(|| AppError::order_not_found(id))
            })
            .await
    }

    /// Place an order and take its quantity out of stock.
    pub async fn place(&self, cx: &TraceContext, order: NewOrder) -> Result<Order, AppError> {
        SERVICE
            .call(cx, "place", |cx| async move {
                if order.quantity <= 0 {
                    return Err(AppError::Validation("Quantity must be greater than 0".into()));
                }

                self.simulator.slow_delay().await;

                if self.users.find_by_id(&cx, order.user_id).await?.is_none() {
                    return Err(AppError::user_not_found(order.user_id));
                }
                let product = self
                    .products
                    .find_by_id(&cx, order.product_id)
                    .await?
                    .ok_or_else(|| AppError::product_not_found(order.product_id))?;

                if product.stock_quantity < order.quantity {
                    return Err(insufficient_stock(&product.name));
                }

                let total = product.price * order.quantity as f64;
                if total > MAX_ORDER_TOTAL {
                    return Err(AppError::BusinessLogic(
                        "Orders above $50,000 require manual approval".into(),
                    ));
                }

                let placed = self
                    .orders
                    .insert_reserving_stock(&cx, order, total)
                    .await?
                    .ok_or_else(|| insufficient_stock(&product.name))?;

                metrics::adjust_entity_count(Entity::Orders, 1);
                tracing::info!(
                    order.id = placed.id,
                    order.total = total,
                    product.id = product.id,
                    "Order placed"
                );
                Ok(placed)
            })
            .await
    }

    pub async fn update_status(&self, cx: &TraceContext, id: i64, status: OrderStatus) -> Result<Order, AppError> {
        SERVICE
            .call(cx, "update_status", |cx| async move {
                let mut order = self
                    .orders
                    .find_by_id(&cx, id)
                    .await?
                    .ok_or_else(|| AppError::order_not_found(id))?;

                match order.status {
                    OrderStatus::Delivered => {
                        return Err(AppError::BusinessLogic("Cannot change status of delivered order".into()))
                    }
                    OrderStatus::Cancelled => {
                        return Err(AppError::BusinessLogic("Cannot change status of cancelled order".into()))
                    }
                    _ => {}
                }

                self.simulator.slow_delay().await;
                self.orders.update_status(&cx, id, status).await?;
                order.status = status;
                order.updated_at = Utc::now();
                Ok(order)
            })
            .await
    }

    /// Cancel an order and put its quantity back in stock.
    pub async fn cancel(&self, cx: &TraceContext, id: i64) -> Result<Order, AppError> {
        SERVICE
            .call(cx, "cancel", |cx| async move {
                let mut order = self
                    .orders
                    .find_by_id(&cx, id)
                    .await?
                    .ok_or_else(|| AppError::order_not_found(id))?;

                ensure_cancellable(order.status)?;

                if self.products.find_by_id(&cx, order.product_id).await?.is_none() {
                    return Err(AppError::product_not_found(order.product_id));
                }

                if !self.orders.cancel_restoring_stock(&cx, &order).await? {
                    // Another request changed the status first.
                    let current = self
                        .orders
                        .find_by_id(&cx, id)
                        .await?
                        .ok_or_else(|| AppError::order_not_found(id))?;
                    ensure_cancellable(current.status)?;
                    return Err(AppError::BusinessLogic("Order status changed while cancelling".into()));
                }

                order.status = OrderStatus::Cancelled;
                order.updated_at = Utc::now();
                tracing::info!(order.id = id, restored = order.quantity, "Order cancelled");
                Ok(order)
            })
            .await
    }

    pub async fn list_by_user(&self, cx: &TraceContext, user_id: i64) -> Result<Vec<Order>, AppError> {
        SERVICE
            .call(cx, "list_by_user", |cx| async move {
                if self.users.find_by_id(&cx, user_id).await?.is_none() {
                    return Err(AppError::user_not_found(user_id));
                }
                self.simulator.slow_delay().await;
                self.orders.find_by_user(&cx, user_id).await
            })
            .await
    }

    pub async fn total_by_user(&self, cx: &TraceContext, user_id: i64) -> Result<f64, AppError> {
        SERVICE
            .call(cx, "total_by_user", |cx| async move {
                if self.users.find_by_id(&cx, user_id).await?.is_none() {
                    return Err(AppError::user_not_found(user_id));
                }
                self.simulator.slow_delay().await;
                self.orders.total_by_user(&cx, user_id).await
            })
            .await
    }

    pub async fn list_by_status(&self, cx: &TraceContext, status: OrderStatus) -> Result<Vec<Order>, AppError> {
        SERVICE
            .call(cx, "list_by_status", |cx| async move {
                self.simulator.slow_delay().await;
                self.orders.find_by_status(&cx, status).await
            })
            .await
    }

    pub async fn count_by_status(&self, cx: &TraceContext, status: OrderStatus) -> Result<i64, AppError> {
        SERVICE
            .call(cx, "count_by_status", |cx| async move {
                self.simulator.slow_delay().await;
                self.orders.count_by_status(&cx, status).await
            })
            .await
    }

    pub async fn list_high_value(&self, cx: &TraceContext, threshold: f64) -> Result<Vec<Order>, AppError> {
        SERVICE
            .call(cx, "list_high_value", |cx| async move {
                self.simulator.slow_delay().await;
                self.orders.find_high_value(&cx, threshold).await
            })
            .await
    }

    pub async fn list_by_date_range(
        &self,
        cx: &TraceContext,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Order>, AppError> {
        SERVICE
            .call(cx, "list_by_date_range", |cx| async move {
                if start > end {
                    return Err(AppError::Validation("Start date cannot be after end date".into()));
                }
                self.simulator.slow_delay().await;
                self.orders.find_by_date_range(&cx, start, end).await
            })
            .await
    }

    /// Charge an order through the simulated payment provider.
    pub async fn process_payment(&self, cx: &TraceContext, id: i64, amount: f64) -> Result<PaymentReceipt, AppError> {
        SERVICE
            .call(cx, "process_payment", |_cx| async move {
                if self.simulator.fails(self.simulator.config().payment_failure_rate) {
                    tracing::error!(order.id = id, "Payment processing failed");
                    return Err(AppError::ExternalService("Payment service is currently unavailable".into()));
                }
                if self.simulator.fails(self.simulator.config().payment_timeout_rate) {
                    tracing::error!(order.id = id, "Payment processing timed out");
                    self.simulator.timeout_delay().await;
                    return Err(AppError::Timeout("Payment processing timed out".into()));
                }

                self.simulator.slow_delay().await;
                let transaction_id = format!("TXN_{}", Utc::now().timestamp_millis());
                tracing::info!(order.id = id, amount, transaction_id = %transaction_id, "Payment processed");
                Ok(PaymentReceipt {
                    transaction_id,
                    status: "SUCCESS",
                })
            })
            .await
    }

    /// Ask the simulated inventory service whether stock can be reserved.
    pub async fn check_inventory(&self, cx: &TraceContext, product_id: i64, quantity: i64) -> Result<bool, AppError> {
        SERVICE
            .call(cx, "check_inventory", |_cx| async move {
                if self.simulator.fails(self.simulator.config().inventory_failure_rate) {
                    tracing::error!(product.id = product_id, "Inventory service failed");
                    return Err(AppError::ExternalService("Inventory service is currently unavailable".into()));
                }
                self.simulator.slow_delay().await;
                tracing::debug!(product.id = product_id, quantity, "Inventory available");
                Ok(true)
            })
            .await
    }
}

fn insufficient_stock(product_name: &str) -> AppError {
    AppError::InsufficientStock(format!(
        "Insufficient stock available for product: {}",
        product_name
    ))
}

fn ensure_cancellable(status: OrderStatus) -> Result<(), AppError> {
    match status {
        OrderStatus::Delivered => Err(AppError::BusinessLogic("Cannot cancel delivered order".into())),
        OrderStatus::Cancelled => Err(AppError::BusinessLogic("Order is already cancelled".into())),
        _ => Ok(()),
    }
}
