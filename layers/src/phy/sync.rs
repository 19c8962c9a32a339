//! Cell synchronization state machine: AGC settling, PSS/SSS FIND search,
//! and TRACK-state timing/frequency maintenance.
//!
//! Grounded on the three-state machine described alongside `pss_sss.rs`'s
//! correlators, generalizing a raw PSS/SSS search into the full
//! AGC -> FIND -> TRACK lifecycle with PSR-based cell detection and
//! EMA timing/CFO tracking.

use crate::LayerError;
use common::types::Pci;
use num_complex::Complex32;
use tracing::{debug, info, warn};

use super::pss_sss::{PssCorrelator, SssCorrelator};

/// Default peak-to-side-lobe ratio threshold to leave FIND state.
pub const DEFAULT_PSR_THRESHOLD: f32 = 3.0;
/// Default number of AGC frames before entering FIND.
pub const DEFAULT_AGC_FRAMES: u32 = 4;
/// Default number of consecutive lost TRACK peaks before falling back to FIND.
pub const DEFAULT_TRACK_MAX_LOST: u32 = 8;
/// EMA smoothing factor for timing/CFO tracking.
pub const DEFAULT_EMA_ALPHA: f32 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Agc,
    Find,
    Track,
}

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub agc_frames: u32,
    pub psr_threshold: f32,
    pub track_max_lost: u32,
    pub ema_alpha: f32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            agc_frames: DEFAULT_AGC_FRAMES,
            psr_threshold: DEFAULT_PSR_THRESHOLD,
            track_max_lost: DEFAULT_TRACK_MAX_LOST,
            ema_alpha: DEFAULT_EMA_ALPHA,
        }
    }
}

/// Cell parameters committed at the FIND->TRACK transition; published
/// once and immutable thereafter.
#[derive(Debug, Clone)]
pub struct LockedCell {
    pub pci: Pci,
    pub cp_extended: bool,
    pub subframe_index: u8,
}

/// Synchronization engine state, owned per receiver chain.
pub struct SyncEngine {
    config: SyncConfig,
    state: SyncState,
    agc_frames_seen: u32,
    locked: Option<LockedCell>,
    lost_peak_count: u32,
    sample_offset_ema: f32,
    cfo_ema: f32,
    /// Last integer-CFO estimate in whole subcarriers, from the optional
    /// three-correlator (-1/0/+1) detector.
    integer_cfo: i32,
    pss_correlator: PssCorrelator,
    sss_correlator: SssCorrelator,
}

/// Result of one FIND-state search attempt.
pub struct FindResult {
    pub nid2: u8,
    pub peak_offset: usize,
    pub psr: f32,
}

impl SyncEngine {
    pub fn new(config: SyncConfig) -> Self {
        Self {
            config,
            state: SyncState::Agc,
            agc_frames_seen: 0,
            locked: None,
            lost_peak_count: 0,
            sample_offset_ema: 0.0,
            cfo_ema: 0.0,
            integer_cfo: 0,
            pss_correlator: PssCorrelator::new(),
            sss_correlator: SssCorrelator::new(),
        }
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn locked_cell(&self) -> Option<&LockedCell> {
        self.locked.as_ref()
    }

    /// Reset to AGC immediately, discarding in-flight correlation state
    /// but not the configured cell capacity (SSS search range, etc).
    pub fn reset(&mut self) {
        self.state = SyncState::Agc;
        self.agc_frames_seen = 0;
        self.locked = None;
        self.lost_peak_count = 0;
        self.sample_offset_ema = 0.0;
        self.cfo_ema = 0.0;
        self.integer_cfo = 0;
    }

    /// Feed one subframe's worth of samples through the state machine.
    pub fn process_subframe(&mut self, samples: &[Complex32], subframe_idx: u8) -> Result<(), LayerError> {
        match self.state {
            SyncState::Agc => {
                self.agc_frames_seen += 1;
                if self.agc_frames_seen >= self.config.agc_frames {
                    info!("AGC settled after {} frames, entering FIND", self.agc_frames_seen);
                    self.state = SyncState::Find;
                }
                Ok(())
            }
            SyncState::Find => {
                self.try_find(samples, subframe_idx);
                Ok(())
            }
            SyncState::Track => {
                self.track(samples, subframe_idx);
                Ok(())
            }
        }
    }

    /// Run the PSS cross-correlation search over all three N_id_2
    /// hypotheses; on PSR exceeding threshold AND a valid SSS decode,
    /// commit the locked cell and move to TRACK.
    fn try_find(&mut self, samples: &[Complex32], subframe_idx: u8) {
        let Some((nid2, peak_value, peak_offset)) = self.pss_correlator.correlate(samples) else {
            return;
        };

        let psr = Self::peak_to_side_lobe_ratio(samples, peak_offset, peak_value);
        debug!(nid2, peak_offset, psr, "FIND-state PSS search");

        if psr < self.config.psr_threshold {
            return;
        }

        let is_subframe_5 = subframe_idx == 5;
        let sss_window_start = peak_offset.saturating_sub(127);
        let sss_window = &samples[sss_window_start.min(samples.len())..];
        let Some((nid1, _sss_corr)) = self.sss_correlator.detect(sss_window, nid2, is_subframe_5) else {
            return;
        };

        let Some(pci) = Pci::from_groups(nid1, nid2 as u16) else {
            warn!(nid1, nid2, "SSS decoded an out-of-range PCI group, discarding");
            return;
        };

        let cp_extended = Self::infer_extended_cp(samples, peak_offset);

        self.locked = Some(LockedCell {
            pci,
            cp_extended,
            subframe_index: if is_subframe_5 { 5 } else { 0 },
        });
        self.lost_peak_count = 0;
        self.state = SyncState::Track;
        info!(pci = pci.0, cp_extended, "FIND -> TRACK, cell locked");
    }

    /// Recorrelate against the locked N_id_2 at subframes 0/5; update EMA
    /// timing/CFO estimates on success, fall back to FIND after too many
    /// consecutive lost peaks.
    fn track(&mut self, samples: &[Complex32], subframe_idx: u8) {
        if subframe_idx != 0 && subframe_idx != 5 {
            return;
        }

        match self.pss_correlator.correlate(samples) {
            Some((nid2, _peak_value, peak_offset)) => {
                self.lost_peak_count = 0;

                let sfo_sample = peak_offset as f32;
                self.sample_offset_ema =
                    (1.0 - self.config.ema_alpha) * self.sample_offset_ema + self.config.ema_alpha * sfo_sample;

                if let Some(cfo) = Self::cp_autocorrelation_phase(samples, peak_offset) {
                    self.cfo_ema = (1.0 - self.config.ema_alpha) * self.cfo_ema + self.config.ema_alpha * cfo;
                }

                // Optional: three-correlator (-1/0/+1 subcarrier) integer-CFO
                // detector, run on the same fresh (uncorrected) samples as
                // the EMA update above, never on its own previously
                // corrected output (resolved Open Question #1).
                self.integer_cfo = self.pss_correlator.detect_integer_cfo(samples, nid2, peak_offset);
            }
            None => {
                self.lost_peak_count += 1;
                if self.lost_peak_count >= self.config.track_max_lost {
                    warn!(lost = self.lost_peak_count, "TRACK peak lost too many times, falling back to FIND");
                    self.state = SyncState::Find;
                    self.locked = None;
                    self.lost_peak_count = 0;
                }
            }
        }
    }

    pub fn sample_offset_estimate(&self) -> f32 {
        self.sample_offset_ema
    }

    pub fn cfo_estimate(&self) -> f32 {
        self.cfo_ema
    }

    /// Last integer-CFO estimate in whole subcarriers (-1, 0 or +1), from
    /// the optional three-correlator detector run during TRACK.
    pub fn integer_cfo_estimate(&self) -> i32 {
        self.integer_cfo
    }

    /// PSR = peak power / mean power of samples outside a small exclusion
    /// window around the peak.
    fn peak_to_side_lobe_ratio(samples: &[Complex32], peak_offset: usize, peak_value: f32) -> f32 {
        const EXCLUSION: usize = 4;
        let mut side_lobe_power = 0.0f32;
        let mut count = 0usize;

        for (i, s) in samples.iter().enumerate() {
            if peak_offset.abs_diff(i) <= EXCLUSION {
                continue;
            }
            side_lobe_power += s.norm_sqr();
            count += 1;
        }

        if count == 0 || side_lobe_power <= 0.0 {
            return 0.0;
        }
        let mean_side_lobe = side_lobe_power / count as f32;
        if mean_side_lobe <= 0.0 {
            return 0.0;
        }
        (peak_value * peak_value) / mean_side_lobe
    }

    /// Infer CP length by comparing the correlation energy of a
    /// normal-CP-spaced repeat against an extended-CP-spaced repeat of the
    /// samples just before the PSS peak.
    fn infer_extended_cp(samples: &[Complex32], peak_offset: usize) -> bool {
        const NORMAL_CP: usize = 144;
        const EXTENDED_CP: usize = 512;
        const FFT_SIZE: usize = 2048;

        let normal_energy = Self::cp_repeat_energy(samples, peak_offset, NORMAL_CP, FFT_SIZE);
        let extended_energy = Self::cp_repeat_energy(samples, peak_offset, EXTENDED_CP, FFT_SIZE);
        extended_energy > normal_energy
    }

    fn cp_repeat_energy(samples: &[Complex32], peak_offset: usize, cp_len: usize, fft_size: usize) -> f32 {
        if peak_offset < cp_len || peak_offset + fft_size > samples.len() {
            return 0.0;
        }
        let mut energy = 0.0f32;
        for i in 0..cp_len {
            let head = samples[peak_offset - cp_len + i];
            let tail_idx = peak_offset - cp_len + i + fft_size;
            if tail_idx >= samples.len() {
                break;
            }
            let tail = samples[tail_idx];
            energy += (head * tail.conj()).re;
        }
        energy
    }

    /// Fractional CFO estimate from the phase of the cyclic-prefix
    /// autocorrelation at the detected peak.
    fn cp_autocorrelation_phase(samples: &[Complex32], peak_offset: usize) -> Option<f32> {
        const CP_LEN: usize = 144;
        const FFT_SIZE: usize = 2048;
        if peak_offset < CP_LEN || peak_offset + FFT_SIZE > samples.len() {
            return None;
        }

        let mut corr = Complex32::new(0.0, 0.0);
        for i in 0..CP_LEN {
            let head = samples[peak_offset - CP_LEN + i];
            let tail = samples[peak_offset - CP_LEN + i + FFT_SIZE];
            corr += head * tail.conj();
        }
        Some(corr.arg() / (2.0 * std::f32::consts::PI))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_in_agc_and_transitions_after_configured_frames() {
        let mut engine = SyncEngine::new(SyncConfig { agc_frames: 2, ..Default::default() });
        assert_eq!(engine.state(), SyncState::Agc);

        let silence = vec![Complex32::new(0.0, 0.0); 16];
        engine.process_subframe(&silence, 0).unwrap();
        assert_eq!(engine.state(), SyncState::Agc);
        engine.process_subframe(&silence, 1).unwrap();
        assert_eq!(engine.state(), SyncState::Find);
    }

    #[test]
    fn reset_returns_to_agc_and_clears_lock() {
        let mut engine = SyncEngine::new(SyncConfig::default());
        engine.state = SyncState::Track;
        engine.locked = Some(LockedCell { pci: Pci::new(5).unwrap(), cp_extended: false, subframe_index: 0 });
        engine.reset();
        assert_eq!(engine.state(), SyncState::Agc);
        assert!(engine.locked_cell().is_none());
    }

    #[test]
    fn track_falls_back_to_find_after_max_lost_peaks() {
        let mut engine = SyncEngine::new(SyncConfig { track_max_lost: 2, ..Default::default() });
        engine.state = SyncState::Track;
        engine.locked = Some(LockedCell { pci: Pci::new(5).unwrap(), cp_extended: false, subframe_index: 0 });

        let silence = vec![Complex32::new(0.0, 0.0); 16];
        engine.track(&silence, 0);
        assert_eq!(engine.state(), SyncState::Track);
        engine.track(&silence, 5);
        assert_eq!(engine.state(), SyncState::Find);
    }
}
