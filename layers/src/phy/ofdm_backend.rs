//! OFDM backend selection.
//!
//! The teacher's version of this module chose between a hardware-
//! accelerated FlexRAN adapter and a software fallback; that adapter
//! isn't part of this build, so this is the software-only path, kept as
//! a thin wrapper so call sites have a stable backend-selection surface
//! to extend later.

use crate::LayerError;
use super::{CyclicPrefix, ResourceGrid};
use super::ofdm::{OfdmModulator, OfdmDemodulator};
use common::types::SubcarrierSpacing;
use num_complex::Complex32;
use tracing::info;

/// Unified OFDM modulator, software-backed.
#[derive(Clone)]
pub enum UnifiedOfdmModulator {
    Software(OfdmModulator),
}

impl UnifiedOfdmModulator {
    pub fn new(fft_size: usize, cp_type: CyclicPrefix, scs: SubcarrierSpacing) -> Result<Self, LayerError> {
        info!("Using software OFDM modulator");
        let modulator = OfdmModulator::new(fft_size, cp_type, scs)?;
        Ok(UnifiedOfdmModulator::Software(modulator))
    }

    pub fn modulate(&self, resource_grid: &ResourceGrid, symbol_index: u8) -> Vec<Complex32> {
        match self {
            UnifiedOfdmModulator::Software(mod_) => mod_.modulate(resource_grid, symbol_index),
        }
    }

    pub fn modulate_slot(&self, resource_grid: &ResourceGrid) -> Vec<Complex32> {
        match self {
            UnifiedOfdmModulator::Software(mod_) => mod_.modulate_slot(resource_grid),
        }
    }

    pub fn symbol_length(&self) -> usize {
        match self {
            UnifiedOfdmModulator::Software(mod_) => mod_.symbol_length(),
        }
    }

    pub fn set_baseband_gain_db(&mut self, gain_db: f32) {
        match self {
            UnifiedOfdmModulator::Software(mod_) => mod_.set_baseband_gain_db(gain_db),
        }
    }

    pub fn configure_bandwidth(&mut self, bw_rb: usize, baseband_backoff_db: f32) {
        match self {
            UnifiedOfdmModulator::Software(mod_) => mod_.configure_bandwidth(bw_rb, baseband_backoff_db),
        }
    }

    pub fn apply_cfo_compensation(&self, samples: &mut [Complex32], cfo_hz: f32, sample_rate: f32) {
        match self {
            UnifiedOfdmModulator::Software(mod_) => mod_.apply_cfo_compensation(samples, cfo_hz, sample_rate),
        }
    }

    pub fn backend_type(&self) -> &'static str {
        match self {
            UnifiedOfdmModulator::Software(_) => "Software",
        }
    }

    pub fn is_accelerated(&self) -> bool {
        match self {
            UnifiedOfdmModulator::Software(_) => false,
        }
    }
}

/// Unified OFDM demodulator (software only).
pub type UnifiedOfdmDemodulator = OfdmDemodulator;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unified_modulator_creation() {
        let modulator = UnifiedOfdmModulator::new(2048, CyclicPrefix::Normal, SubcarrierSpacing::Scs15);

        assert!(modulator.is_ok());
        let modulator = modulator.unwrap();

        assert!(!modulator.is_accelerated());
        assert_eq!(modulator.backend_type(), "Software");
    }
}
