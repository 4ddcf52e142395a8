//! # skipper-renderer
//!
//! Tera-based Document Renderer: turns a job's template identifier and
//! merged context into the raw configuration document pushed to the server.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::path::Path;
//! use skipper_core::Context;
//! use skipper_renderer::TemplateEngine;
//!
//! fn render_basic(templates: &Path) {
//!     if let Ok(engine) = TemplateEngine::from_dir(templates) {
//!         if let Ok(xml) = engine.render("basic.txt", &Context::new()) {
//!             println!("{xml}");
//!         }
//!     }
//! }
//! ```

pub mod context;
pub mod engine;
pub mod error;

pub use context::{job_context, to_tera_context};
pub use engine::TemplateEngine;
pub use error::RenderError;
