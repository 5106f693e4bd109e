pub mod payments;
pub mod processor;
pub mod queue;
pub mod reconciler;

pub use payments::{PaymentInstruction, PaymentService};
pub use processor::SubmissionWorker;
pub use queue::{QueueItem, SubmissionQueue};
pub use reconciler::Reconciler;
