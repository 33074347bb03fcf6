//! Core traits for preview monitoring
//!
//! This module defines the abstract interfaces the monitor is composed from.
//!
//! - [`IdentityExtractor`]: Read the running binary's build identity
//! - [`StoreBuildGate`]: Decide whether update checks are pointless here
//! - [`LatestPreviewService`]: Query the server for the latest preview
//! - [`IgnoredPreviewStore`]: Remember the preview the user dismissed

pub mod identity;
pub mod store_gate;
pub mod preview_service;
pub mod ignored_store;

pub use identity::IdentityExtractor;
pub use store_gate::StoreBuildGate;
pub use preview_service::LatestPreviewService;
pub use ignored_store::{IgnoredPreviewStore, IgnoredRecord};
