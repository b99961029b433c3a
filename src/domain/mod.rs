//! Database query modules
//!
//! Every query takes a generic `Executor`, so the same function runs against
//! the pool or inside a transaction opened by the caller.

pub mod engagement;
pub mod profiles;
pub mod recordings;
pub mod users;
pub mod videos;
