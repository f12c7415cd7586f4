pub mod discovery;
pub mod error;
pub mod export;
pub mod extract;
pub mod models;
pub mod pages;
pub mod pipeline;
pub mod stage;
pub mod store;
pub mod throttle;
pub mod traits;

#[cfg(test)]
mod testutil;

pub use error::AppError;
pub use export::{Exporter, decode_breakout, encode_breakout};
pub use models::{Absence, Breakout, Extracted, FieldId, PartialRecord, Value};
pub use pipeline::{
    PersistPolicy, Pipeline, PipelineConfig, PipelineReporter, PipelineSummary, TracingReporter,
};
pub use store::AggregateStore;
pub use throttle::Politeness;
pub use traits::{Fetcher, RowSink};
