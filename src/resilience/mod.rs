pub mod deadline;
pub mod retry;

pub use deadline::{Deadline, DeadlineExceeded};
pub use retry::RetryPolicy;
