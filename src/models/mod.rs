//! Domain records and request payloads.
//!
//! Request payloads deserialize with optional fields and report missing
//! required ones through `Validate`, so shape problems surface as a field map
//! instead of a deserializer message.

pub mod alert;
pub mod order;
pub mod product;
pub mod user;

pub use alert::{AlertLevel, AlertNotification};
pub use order::{NewOrder, Order, OrderRequest, OrderStatus};
pub use product::{NewProduct, Product, ProductRequest};
pub use user::{NewUser, User, UserRequest};

use crate::error::FieldErrors;

/// Field-level request validation.
pub trait Validate {
    /// Add one entry per failing field.
    fn validate(&self, errors: &mut FieldErrors);
}

impl<T: Validate> Validate for Vec<T> {
    fn validate(&self, errors: &mut FieldErrors) {
        for (index, item) in self.iter().enumerate() {
            let mut item_errors = FieldErrors::new();
            item.validate(&mut item_errors);
            for (field, message) in item_errors {
                errors.insert(format!("[{}].{}", index, field), message);
            }
        }
    }
}

impl Validate for serde_json::Value {
    fn validate(&self, _errors: &mut FieldErrors) {}
}

fn require<T>(errors: &mut FieldErrors, field: &str, value: &Option<T>, message: &str) {
    if value.is_none() {
        errors.insert(field.to_string(), message.to_string());
    }
}
