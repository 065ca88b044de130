/// Receives progress updates from a running engine.
///
/// Called synchronously from the engine loop, so implementations must not
/// block. Units are engine-specific: the record engine counts messages, the
/// replay engine counts bytes read from the recording.
pub trait ProgressReporter: Send {
    fn set_total(&mut self, total: u64);
    fn add(&mut self, delta: u64);
    fn set(&mut self, current: u64);
    fn close(&mut self) -> Result<(), crate::error::ClientError>;
}

/// Reporter that discards every update.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn set_total(&mut self, _total: u64) {}
    fn add(&mut self, _delta: u64) {}
    fn set(&mut self, _current: u64) {}
    fn close(&mut self) -> Result<(), crate::error::ClientError> {
        Ok(())
    }
}
