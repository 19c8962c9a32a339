//! HARQ soft-combining buffer, keyed by HARQ process ID: RV=0 resets the
//! buffer for a new transmission, RV>0 saturating-accumulates onto the
//! previous soft bits (chase/incremental-redundancy combining).

use std::collections::HashMap;

const LLR_SATURATION: f32 = 1.0e4;

/// Soft buffer for a single HARQ process.
#[derive(Debug, Clone, Default)]
pub struct HarqSoftBuffer {
    llrs: Vec<f32>,
    transmission_count: u32,
}

impl HarqSoftBuffer {
    /// Combine `new_llrs` into the buffer per the supplied redundancy
    /// version: RV=0 starts a fresh transmission (buffer reset), any other
    /// RV accumulates onto whatever is already buffered.
    pub fn combine(&mut self, new_llrs: &[f32], rv: u8) {
        if rv == 0 || self.llrs.is_empty() {
            self.llrs = new_llrs.to_vec();
        } else {
            if self.llrs.len() < new_llrs.len() {
                self.llrs.resize(new_llrs.len(), 0.0);
            }
            for (acc, &v) in self.llrs.iter_mut().zip(new_llrs.iter()) {
                *acc = (*acc + v).clamp(-LLR_SATURATION, LLR_SATURATION);
            }
        }
        self.transmission_count += 1;
    }

    pub fn llrs(&self) -> &[f32] {
        &self.llrs
    }

    pub fn transmission_count(&self) -> u32 {
        self.transmission_count
    }

    pub fn reset(&mut self) {
        self.llrs.clear();
        self.transmission_count = 0;
    }
}

/// Configuration governing the HARQ process pool.
#[derive(Debug, Clone)]
pub struct HarqConfig {
    pub max_processes: u8,
}

impl Default for HarqConfig {
    fn default() -> Self {
        Self { max_processes: 16 }
    }
}

/// HARQ soft-buffer pool keyed by process ID, one buffer per downlink or
/// uplink HARQ process.
pub struct HarqBufferPool {
    config: HarqConfig,
    buffers: HashMap<u8, HarqSoftBuffer>,
}

impl HarqBufferPool {
    pub fn new(config: HarqConfig) -> Self {
        Self { config, buffers: HashMap::new() }
    }

    pub fn combine(&mut self, harq_id: u8, new_llrs: &[f32], rv: u8) -> &HarqSoftBuffer {
        let buffer = self.buffers.entry(harq_id).or_default();
        buffer.combine(new_llrs, rv);
        buffer
    }

    pub fn get(&self, harq_id: u8) -> Option<&HarqSoftBuffer> {
        self.buffers.get(&harq_id)
    }

    pub fn reset(&mut self, harq_id: u8) {
        if let Some(buffer) = self.buffers.get_mut(&harq_id) {
            buffer.reset();
        }
    }

    pub fn max_processes(&self) -> u8 {
        self.config.max_processes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rv0_resets_buffer() {
        let mut buf = HarqSoftBuffer::default();
        buf.combine(&[1.0, 2.0, 3.0], 0);
        buf.combine(&[5.0, 5.0, 5.0], 2);
        assert_eq!(buf.llrs(), &[6.0, 7.0, 8.0]);

        buf.combine(&[0.5, 0.5, 0.5], 0);
        assert_eq!(buf.llrs(), &[0.5, 0.5, 0.5]);
    }

    #[test]
    fn accumulation_saturates() {
        let mut buf = HarqSoftBuffer::default();
        buf.combine(&[9000.0], 0);
        buf.combine(&[9000.0], 1);
        assert!(buf.llrs()[0] <= 1.0e4);
    }

    #[test]
    fn pool_tracks_independent_processes() {
        let mut pool = HarqBufferPool::new(HarqConfig::default());
        pool.combine(0, &[1.0], 0);
        pool.combine(1, &[2.0], 0);
        assert_eq!(pool.get(0).unwrap().llrs(), &[1.0]);
        assert_eq!(pool.get(1).unwrap().llrs(), &[2.0]);
    }
}
