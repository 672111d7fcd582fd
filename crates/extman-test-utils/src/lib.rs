//! Shared test utilities for the Extension Manager workspace.
//!
//! A dev-dependency only, never published.
//!
//! # Modules
//!
//! - [`fixture`]: [`ExtensionFixture`], a temporary remote repository, local
//!   repository and configuration file

pub mod fixture;

pub use fixture::ExtensionFixture;
