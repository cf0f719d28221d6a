//! ---
//! ncm_section: "01-core-functionality"
//! ncm_subsection: "module"
//! ncm_type: "source"
//! ncm_scope: "code"
//! ncm_description: "Shared primitives and utilities for the NCM runtime."
//! ncm_version: "v0.0.0-prealpha"
//! ncm_owner: "tbd"
//! ---
#![warn(missing_docs)]
//! Shared building blocks used across the NCM workspace: the status/error
//! taxonomy spoken by every component, configuration loading, tracing
//! bring-up, and time helpers.

pub mod config;
pub mod logging;
pub mod status;
pub mod time;

pub use status::{NcmError, NcmResult, StatusCode};
