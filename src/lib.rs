//! Stagehand - configuration-driven asset build orchestrator
//!
//! This library provides functionality to:
//! - Load a multi-environment configuration document and select one environment
//! - Run the script, stylesheet, markup, asset, cleanup and size-report stages
//! - Watch sources and re-run only the stage a change concerns
//! - Notify browsers to reload, optionally through a bundled live-reload server

pub mod build;
pub mod cli;
pub mod config;
pub mod include;
pub mod logging;
pub mod reload;
#[cfg(feature = "live-server")]
pub mod server;
pub mod sourcemap;
pub mod stages;
pub mod tools;
pub mod watch;
