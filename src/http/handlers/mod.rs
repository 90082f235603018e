//! REST handlers.
//!
//! Every handler runs its work through a controller `Component`, so each
//! request gets a `<Type>Controller.<method>` span under the root span.
//! Handlers only translate between HTTP and services; rules live in
//! `services`.

pub mod alerts;
pub mod analytics;
pub mod health;
pub mod orders;
pub mod products;
pub mod users;
