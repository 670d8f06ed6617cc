//! Database models and their queries, split by table.

pub mod order;
pub mod product;
pub mod user;

pub use order::*;
pub use product::*;
pub use user::*;
