//! The bus-facing adapter: property reads, method
//! dispatch, change-notification emission, and authorization checks.
//! Peripheral plumbing over the core engine in `crate::arbiter`.

pub mod auth;
mod common;
pub mod legacy;
pub mod modern;
pub mod server;
pub mod shared;
