//! The synchronization engine.
//!
//! Leaf-first: [`topic`] builds addresses, [`discovery`] announces entities,
//! [`commands`] applies inbound documents, [`sync`] publishes the aggregates
//! and [`supervisor`] owns the connection and drives the rest once per tick.
//! The broker session, the durable store and host facilities are reached only
//! through the [`transport`], [`store`] and [`platform`] seams.

pub mod commands;
pub mod discovery;
pub mod model;
pub mod platform;
pub mod store;
pub mod supervisor;
pub mod sync;
pub mod topic;
pub mod transport;
pub mod update;

#[cfg(test)]
pub(crate) mod testing;

pub use supervisor::{RunExit, Supervisor, TickOutcome};
