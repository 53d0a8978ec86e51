//! Core types, algorithms and trait definitions for the Credence belief
//! graph engine.
//!
//! This crate holds no HTTP or database dependencies. The pure algorithms
//! (decay, context resolution, outcome folding, support propagation) live in
//! their own modules and are driven by [`engine::BeliefEngine`] over any
//! [`store::BeliefStore`] backend.

pub mod belief;
pub mod classify;
pub mod config;
pub mod context;
pub mod decay;
pub mod edge;
pub mod engine;
pub mod error;
pub mod event;
pub mod memory;
pub mod propagation;
pub mod query;
pub mod resolver;
pub mod store;
pub mod update;

pub use error::{Error, Result};
