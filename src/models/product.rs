use serde::{Deserialize, Serialize};

use crate::error::FieldErrors;
use crate::models::{require, Validate};

/// Highest price the update endpoint accepts.
pub const MAX_PRODUCT_PRICE: f64 = 10_000.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub stock_quantity: i64,
    pub category: Option<String>,
}

/// Payload for creating or replacing a product.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub stock_quantity: Option<i64>,
    pub category: Option<String>,
}

impl Validate for ProductRequest {
    fn validate(&self, errors: &mut FieldErrors) {
        require(errors, "name", &self.name, "Product name is required");
        require(errors, "price", &self.price, "Price is required");
    }
}

/// A product that passed request validation.
#[derive(Debug, Clone, PartialEq)]
pub struct NewProduct {
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub stock_quantity: i64,
    pub category: Option<String>,
}

impl From<ProductRequest> for NewProduct {
    fn from(req: ProductRequest) -> Self {
        Self {
            name: req.name.unwrap_or_default(),
            description: req.description,
            price: req.price.unwrap_or_default(),
            stock_quantity: req.stock_quantity.unwrap_or_default(),
            category: req.category,
        }
    }
}
