//! Shared types for the order system.
//!
//! Identifier newtypes keep the various UUID- and string-based IDs from
//! being mixed up at compile time; `Money` keeps amounts in integer cents.

pub mod ids;
pub mod money;

pub use ids::{OrderId, ProductId, UserId};
pub use money::Money;
