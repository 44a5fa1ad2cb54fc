pub mod events;
pub mod metrics;
pub mod process_metrics;
pub mod routes;

pub use events::{CallEvent, CompositeSink, EventOutcome, EventSink, TracingSink};
pub use metrics::{Metrics, MetricsSink};
