//! Measurement value simulation
//!
//! Catalog measurements flagged `varies` follow a bounded random walk in
//! physical units, written back into slave memory so DAQ lists and UPLOAD
//! see live values.

use std::sync::Arc;

use ccp_daq::Element;
use ccp_slave::{Memory, SimulatedMemory, SlaveConfig};
use rand::Rng;
use tracing::{debug, warn};

struct Walk {
    element: Element,
    variation: f64,
    value: f64,
}

/// Random walk over the varying measurements
pub struct MeasurementSimulator {
    memory: Arc<SimulatedMemory>,
    walks: Vec<Walk>,
}

impl MeasurementSimulator {
    /// Start every walk at the value currently in memory
    pub fn from_config(config: &SlaveConfig, memory: Arc<SimulatedMemory>) -> Self {
        let walks = config
            .measurements
            .iter()
            .filter(|m| m.varies && m.variation != 0.0)
            .map(|m| {
                let element = m.element.clone();
                let value = memory
                    .read(element.address, element.extension, element.len())
                    .ok()
                    .and_then(|bytes| element.raw_value(&bytes).ok())
                    .map(|raw| element.physical(raw))
                    .or(element.min)
                    .unwrap_or(0.0);
                Walk {
                    element,
                    variation: m.variation.abs(),
                    value,
                }
            })
            .collect();

        Self { memory, walks }
    }

    pub fn len(&self) -> usize {
        self.walks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.walks.is_empty()
    }

    /// Advance every walk by one random step
    pub fn update(&mut self) {
        let mut rng = rand::thread_rng();

        for walk in &mut self.walks {
            let delta = rng.gen_range(-walk.variation..=walk.variation);
            let mut value = walk.value + delta;
            if let Some(min) = walk.element.min {
                value = value.max(min);
            }
            if let Some(max) = walk.element.max {
                value = value.min(max);
            }
            walk.value = value;

            let bytes = walk.element.encode(value);
            match self
                .memory
                .store(walk.element.address, walk.element.extension, &bytes)
            {
                Ok(()) => debug!(measurement = %walk.element.name, value, "Updated"),
                Err(e) => warn!(measurement = %walk.element.name, error = %e, "Update failed"),
            }
        }
    }
}
