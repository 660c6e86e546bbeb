//! Shared utilities and common types for the GPS tracker backend.
//!
//! This crate provides common functionality used across all other crates:
//! - Cryptographic utilities (hashing, constant-time comparison)
//! - Transliteration of text the tracking platform cannot store
//! - Common validation logic

pub mod crypto;
pub mod transliteration;
pub mod validation;
