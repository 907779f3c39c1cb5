//! Infrastructure: unit of work, outbox, repositories, and services.

pub mod config;
pub mod outbox;
pub mod repositories;
pub mod services;
pub mod uow;

#[cfg(test)]
mod integration_tests;
