//! Host-facing command contract and the stdin/stdout JSON bridge.

pub mod channel;
pub mod contract;
pub mod handler;
pub mod stdio;
