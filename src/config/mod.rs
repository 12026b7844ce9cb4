//! Configuration module
//!
//! Provides the environment document schema, its loader, and environment
//! selection.

pub mod loader;
pub mod resolver;
pub mod schema;

pub use loader::{find_config, load_config, parse_config, resolve_path, ConfigError};
pub use resolver::{resolve, EnvironmentResolver, ResolvedEnvironment};
pub use schema::*;
