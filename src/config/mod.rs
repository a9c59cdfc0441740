//! Configuration models for dispatch runs and their file locations.

pub mod dispatch;

pub use dispatch::{BatchShaping, DispatchConfig, ExhaustionPolicy};
