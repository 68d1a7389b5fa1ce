//! Outbound adapters: durable implementations of the driven ports.

pub mod persistence;
pub mod queue;
