//! Core domain types and errors for the `ciglue` CI tools.
//!
//! Everything the other crates share lives here: the central [`Error`] enum
//! with its [`Result`] alias, and the small input types that both the
//! cache-aware build executor and the report normalizer consume
//! ([`PathSet`], [`CommandSpec`]).

pub mod errors;
pub mod types;

pub use self::{
    errors::{Error, Result},
    types::{CommandSpec, PathSet},
};
