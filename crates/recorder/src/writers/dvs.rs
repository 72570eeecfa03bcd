//! DvsWriter - dvs_npy/dvs_{frame}.npy

use contracts::{ContractError, FrameWriter, SensorPacket, SensorPayload};
use tracing::trace;

use crate::npy;
use crate::output::OutputLayout;
use crate::writers::writer_error;

/// Writes each DVS frame as a structured event array
pub struct DvsWriter {
    name: String,
    layout: OutputLayout,
}

impl DvsWriter {
    pub fn new(name: impl Into<String>, layout: OutputLayout) -> Self {
        Self {
            name: name.into(),
            layout,
        }
    }
}

impl FrameWriter for DvsWriter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn write(&mut self, packet: &SensorPacket) -> Result<(), ContractError> {
        let SensorPayload::DvsEvents(dvs) = &packet.payload else {
            return Err(ContractError::UnexpectedPayload {
                writer: self.name.clone(),
                expected: "dvs_events",
                actual: packet.payload.kind_name(),
            });
        };

        npy::write_npy(
            &self.layout.dvs_npy(packet.frame),
            &[dvs.events.len()],
            &dvs.events,
        )
        .map_err(|e| writer_error(&self.name, e))?;

        trace!(
            writer = %self.name,
            frame = packet.frame,
            events = dvs.events.len(),
            "dvs frame written"
        );
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        Ok(())
    }
}
