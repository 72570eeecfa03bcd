//! FrameWriter trait - Recorder output interface

use crate::{ContractError, SensorPacket};

/// Per-sensor frame writer
///
/// A writer is owned by exactly one worker task, so implementations may keep
/// files open across calls.
#[trait_variant::make(FrameWriter: Send)]
pub trait LocalFrameWriter {
    /// Writer name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Persist one frame
    ///
    /// # Errors
    /// Returns write error (should include context)
    async fn write(&mut self, packet: &SensorPacket) -> Result<(), ContractError>;

    /// Flush buffered output (if any)
    async fn flush(&mut self) -> Result<(), ContractError>;

    /// Close writer
    async fn close(&mut self) -> Result<(), ContractError>;
}
