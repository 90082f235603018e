//! Data access for users, products and orders.
//!
//! Every public method runs inside a `<Repository>.<method>` span and every
//! statement goes through the database tracer, so a request's trace shows
//! the repository call with its `db.*` client span nested below it.

pub mod orders;
pub mod products;
pub mod users;

pub use orders::OrderRepository;
pub use products::ProductRepository;
pub use users::UserRepository;
