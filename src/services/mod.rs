pub mod counters;
pub mod error;
pub mod identity;
pub mod privacy;
pub mod promotion;
pub mod session;
pub mod storage;
pub mod visibility;
