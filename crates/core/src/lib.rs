//! `flowgraph-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! identifiers, the aggregate/event contracts, and the domain error model.

pub mod aggregate;
pub mod error;
pub mod event;
pub mod id;

pub use aggregate::{Aggregate, AggregateMeta};
pub use error::DomainError;
pub use event::DomainEvent;
pub use id::{AggregateId, EventId};
