//! Inventory-allocation and balance-ledger engine for an account brokerage.
//!
//! The engine brokers digital inventory between an operator who bulk-loads
//! credential pairs and users who claim, fulfil, and submit them for
//! payment. It owns the item lifecycle, the per-user available/hold
//! balances, referral bonuses, and withdrawals, keeping all of them correct
//! under concurrent access with the relational store as the sole
//! synchronisation point.
//!
//! The conversational surface, message delivery, and process startup are
//! collaborators: they drive the services in [`domain`] and consume the
//! notification outbox, but live outside this crate.

pub mod config;
pub mod domain;
pub mod outbound;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
