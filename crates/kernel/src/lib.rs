//! Reference filesystem host: builds entries into `dist/`, one file per unit.

pub mod build;
pub mod cli;
pub mod pipeline;
pub mod resolver;

pub use build::{build, emit, BuildReport, EmittedUnit};
pub use cli::Cli;
pub use pipeline::FsPipeline;
pub use resolver::UnitResolver;

use std::sync::Once;

static INIT: Once = Once::new();

/// Install the fmt subscriber once, filtered by `RUST_LOG`.
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .init();
    });
}
