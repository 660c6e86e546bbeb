//! Domain layer for the GPS tracker backend.
//!
//! This crate contains:
//! - Models of tracking platform entities (Device, Position, Group)
//! - The map view model and the device category codec
//! - Business logic services (aggregation, access control, registration)
//! - Domain error types

pub mod error;
pub mod models;
pub mod services;

pub use error::DomainError;
