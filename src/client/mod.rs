pub mod builder;
pub mod error;
pub mod outcome;
pub mod request;
pub mod resilient;
pub mod transport;

pub use error::{CallError, ErrorKind};
pub use outcome::{ApiCallOutcome, FailureCause, OutcomeKind};
pub use request::{ApiRequest, CachePolicy};
pub use resilient::{CallResponse, ResilientApiClient};
pub use transport::{HttpTransport, Transport, TransportRequest};
