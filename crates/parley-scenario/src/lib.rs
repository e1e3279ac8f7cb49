//! Scenario authoring client for the Parley platform.
//!
//! The authoring service generates a roleplay scenario from a prompt and an
//! emotion tag, and publishes it on request. The orchestrator consumes it as
//! an opaque create/publish pair; this crate provides the [`ScenarioService`]
//! trait for that seam plus the [`ScenarioClient`] HTTP implementation.

mod client;
mod error;

pub use client::{CreatedScenario, ScenarioClient, ScenarioService};
pub use error::ScenarioError;
