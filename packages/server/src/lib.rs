//! dengon chat server library.
//!
//! Connection registry, routing engine, durability forwarder and outbound
//! client adapter, plus the axum surface that exposes them.

// layers
pub mod domain;
pub mod infrastructure;
pub mod ui;
pub mod usecase;

pub mod config;
