//! # quire-renderer
//!
//! The rendering-engine boundary: a single-method [`RenderEngine`] trait, the
//! production [`CommandEngine`] that shells out to an external renderer, and a
//! deterministic [`StubEngine`] for tests.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use quire_core::EngineConfig;
//! use quire_renderer::CommandEngine;
//!
//! fn build() {
//!     if let Ok(engine) = CommandEngine::from_config(&EngineConfig::default()) {
//!         println!("rendering with {}", engine.program());
//!     }
//! }
//! ```

pub mod command;
pub mod context;
pub mod engine;
pub mod error;
pub mod stub;

pub use command::CommandEngine;
pub use context::ArgContext;
pub use engine::{Artifact, RenderEngine, RenderRequest};
pub use error::EngineError;
pub use stub::{StubBehavior, StubEngine};
