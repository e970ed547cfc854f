//! Shared foundational types used across the kernjit crates.
//!
//! This crate provides content hashing for compiled units and the validated
//! logical name under which a translation unit is compiled.

#![warn(missing_docs)]

pub mod hash;
pub mod unit_name;

pub use hash::ContentHash;
pub use unit_name::{InvalidUnitName, UnitName};
