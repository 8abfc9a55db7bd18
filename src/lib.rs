#![warn(missing_debug_implementations, rust_2018_idioms, missing_docs)]
#![doc = include_str!("../README.md")]
//! ## Features
#![doc = document_features::document_features!()]

/// Module containing the in-memory model of JVM classes.
pub mod jvm;
pub(crate) mod macros;
/// Module containing the mixin engine: parsing, selection, injection points and splicing.
pub mod mixin;
/// Module containing the reference interpreter for transformed classes.
#[cfg(feature = "runtime")]
pub mod runtime;
/// Module containing the APIs for the JVM type system.
pub mod types;

/// Test utilities
#[cfg(test)]
pub(crate) mod tests;
