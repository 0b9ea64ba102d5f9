use thiserror::Error;

/// Hand-off queue error conditions.
#[derive(Debug, Error)]
pub enum HandoffError {
    /// The consumer side has been dropped; no further batches can be
    /// delivered.
    #[error("hand-off queue disconnected")]
    Disconnected,
}
