//! SLR Wizard backend client
//!
//! [`ApiClient`] implements the core's [`slr_core::GenerationClient`] and
//! [`slr_core::ProjectStore`] over the backend's JSON API. The wire shapes
//! in [`wire`] are decoded leniently and converted into domain types before
//! anything reaches the wizard.

pub mod client;
pub mod wire;

pub use client::{project_path, protocol_path, ApiClient};
