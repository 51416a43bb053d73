//! Off-main-thread code splitting.
//!
//! Build time: [`rewriter::Rewriter`] points worker call sites at their own
//! compiled units, [`finalizer::Finalizer`] wraps unit bodies as named
//! declarations and prepends the loader. Run time: [`loader::Loader`] models
//! the bootstrap from [`runtime::LOADER_JS`].

pub mod config;
pub mod diagnostics;
pub mod edit;
pub mod error;
pub mod finalizer;
pub mod loader;
pub mod pipeline;
pub mod rewriter;
pub mod runtime;
pub mod scanner;
pub mod session;

pub use config::{Config, OutputFormat};
pub use diagnostics::{Diagnostic, SourcePosition};
pub use error::{ConfigError, EditError, FinalizeError, RewriteError};
pub use finalizer::{FinalizedUnit, Finalizer};
pub use loader::{ContextKind, Host, LoadError, Loader};
pub use pipeline::{CompiledUnit, ModuleId, Pipeline, PlaceholderToken};
pub use rewriter::{Rewriter, Rewritten};
pub use session::BuildSession;
