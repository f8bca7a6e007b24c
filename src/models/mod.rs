pub mod device;
pub mod order;

pub use device::*;
pub use order::*;

/// Result of one simulated background processing run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    Failed,
}

/// A record that lives in a [`ResourceStore`](crate::store::ResourceStore) and
/// goes through the simulated processing lifecycle.
pub trait Resource: Clone + Send + Sync + 'static {
    /// Human-readable kind used in log lines and not-found messages.
    const KIND: &'static str;

    fn id(&self) -> &str;

    fn assign_id(&mut self, id: String);

    fn idempotency_key(&self) -> Option<&str>;

    /// Status applied when the record is first accepted by the store.
    fn mark_accepted(&mut self);

    /// Status applied while an update or deletion is in flight.
    fn mark_processing(&mut self);

    fn finish(&mut self, outcome: Outcome);

    /// True once the record reached COMPLETED or FAILED.
    fn is_complete(&self) -> bool;
}
