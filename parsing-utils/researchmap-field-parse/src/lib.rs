//! Field extraction for researchmap researcher profile records.
//!
//! The two binaries in this crate share the record loader, the CSV writer and
//! the logging setup defined here.

pub mod config;
pub mod extract;
pub mod history;
pub mod llm;
pub mod output;
pub mod pipeline;
pub mod record;
pub mod runtime;
