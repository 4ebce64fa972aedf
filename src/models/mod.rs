//! Data models

mod entitlement;
mod pool;
mod remote;

pub use entitlement::*;
pub use pool::*;
pub use remote::*;
