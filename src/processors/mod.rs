// imgcrunch/src/processors/mod.rs
mod batch;
mod compressor;
mod dispatcher;
mod loader;
pub(crate) mod metadata;
mod placement;
mod planner;
mod resizer;

pub use batch::BatchProcessor;
pub use compressor::{Compressor, Encoded};
pub use dispatcher::Dispatcher;
pub use loader::Loader;
pub use metadata::MetadataProcessor;
pub use placement::OutputManager;
pub use planner::{FilePlanner, Plan};
pub use resizer::Resizer;
