//! ---
//! ncm_section: "01-core-functionality"
//! ncm_subsection: "module"
//! ncm_type: "source"
//! ncm_scope: "code"
//! ncm_description: "Baseline lifecycle manager: CRUD, activation, rollback, diff, registration."
//! ncm_version: "v0.0.0-prealpha"
//! ncm_owner: "tbd"
//! ---
#![warn(missing_docs)]
//! The Baseline Lifecycle Manager. Snapshots a project's configuration into
//! named NetworkBaselines on two parallel tracks (Design and Operation),
//! promotes design snapshots into the operation track on activation, rolls
//! live projects back to a snapshot, diffs snapshots against the live
//! project, and registers baseline bills-of-materials with the external
//! service platform.
//!
//! Every mutation funnels through the Domain Store lock: load a copy,
//! validate, mutate the copy, persist, swap back in. Only configuration
//! rendering and platform registration run outside the lock.

pub mod manager;
pub mod registrar;
pub mod render;

pub use manager::BaselineManager;
pub use registrar::{BaselineRegistration, PlatformRegistrar, RecordingRegistrar};
pub use render::{strip_to_configure_terminal, ConfigRenderer, TableRenderer};
