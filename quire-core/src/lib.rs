//! Quire core library: parameter spaces, output layout and run configuration.
//!
//! - [`binding`]: dimension product and explicit binding lists
//! - [`layout`]: slugified output paths and collision detection
//! - [`config`]: YAML run configuration
//! - [`error`]: [`ConfigError`], [`OutputCollisionError`]

pub mod binding;
pub mod config;
pub mod error;
pub mod layout;
pub mod ordered;
pub mod types;

pub use binding::{BindingSet, BindingSpace, EnumerationPolicy, ProductIter};
pub use config::{EngineConfig, RunConfig};
pub use error::{ConfigError, OutputCollisionError};
pub use layout::{CollisionGuard, OutputLayout};
pub use types::{Binding, BindingDimension, OutputFormat, TemplateRef};
