//! # autoauth-orchestrator
//!
//! The end-to-end login workflow.
//!
//! This crate provides:
//! - [`LoginWorkflow`]: URL capture, profile staging, consent automation,
//!   manual fallback and code relay, generic over the process, browser and
//!   prompt capabilities
//! - [`BrowserLauncher`] with the Chromium-backed [`ChromeLauncher`]

mod launcher;
mod workflow;

pub use launcher::{BrowserLauncher, ChromeLauncher};
pub use workflow::{CodeOrigin, LoginContext, LoginReport, LoginWorkflow};
