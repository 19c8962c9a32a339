//! Downlink channel estimation: LS per-pilot estimate, frequency-direction
//! FIR smoothing, time-direction piecewise-linear interpolation, noise
//! estimation, and RSRP/RSRQ/RSSI/SNR reporting.
//!
//! Grounded on the channel-estimation pipeline described in
//! `examples/original_source/srslte/lib/ch_estimation/chest_dl.c`: teacher
//! has pilot tables (`dmrs.rs`) but no estimator, so this is new code
//! written in the teacher's module/logging idiom.

use num_complex::Complex32;
use tracing::debug;

/// Maximum frequency-direction smoothing filter length (invariant: ≤ 9).
pub const MAX_FREQ_FILTER_TAPS: usize = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoiseEstimationAlgorithm {
    /// Residual between raw LS and frequency-smoothed pilots.
    Refs,
    /// Residual against the known PSS sequence at subframe 0/5.
    Pss,
    /// Power of the 5 guard subcarriers either side of PSS/SSS.
    EmptySubcarrier,
}

#[derive(Debug, Clone)]
pub struct ChestConfig {
    /// Frequency smoothing filter length, 1..=9 (odd, symmetric).
    pub freq_filter_taps: usize,
    pub noise_algorithm: NoiseEstimationAlgorithm,
}

impl Default for ChestConfig {
    fn default() -> Self {
        Self { freq_filter_taps: 5, noise_algorithm: NoiseEstimationAlgorithm::Refs }
    }
}

/// A per-pilot-symbol LS estimate: one complex value per pilot-bearing
/// resource element, in ascending subcarrier order.
#[derive(Debug, Clone)]
pub struct PilotEstimate {
    pub symbol_index: u8,
    pub values: Vec<Complex32>,
}

#[derive(Debug, Clone)]
pub struct ChannelEstimateReport {
    pub rsrp: f32,
    pub rssi: f32,
    pub rsrq: f32,
    pub snr: f32,
    pub noise_variance: f32,
}

pub struct ChannelEstimator {
    config: ChestConfig,
}

impl ChannelEstimator {
    pub fn new(config: ChestConfig) -> Self {
        assert!(config.freq_filter_taps >= 1 && config.freq_filter_taps <= MAX_FREQ_FILTER_TAPS);
        Self { config }
    }

    /// LS per-pilot estimate: conjugate multiply since known pilots have
    /// unit magnitude (`h = y * conj(p)`).
    pub fn ls_estimate(received: &[Complex32], known_pilots: &[Complex32]) -> Vec<Complex32> {
        received.iter().zip(known_pilots.iter()).map(|(&y, &p)| y * p.conj()).collect()
    }

    /// Raised-cosine-weighted FIR of `self.config.freq_filter_taps` taps,
    /// coefficients summing to 1; edges are linearly extrapolated.
    fn frequency_filter_coeffs(&self) -> Vec<f32> {
        let n = self.config.freq_filter_taps;
        let center = (n - 1) as f32 / 2.0;
        let raw: Vec<f32> = (0..n)
            .map(|i| {
                let x = (i as f32 - center) / (center + 1.0);
                (1.0 - x.abs()).max(0.0)
            })
            .collect();
        let sum: f32 = raw.iter().sum();
        if sum > 0.0 {
            raw.iter().map(|&v| v / sum).collect()
        } else {
            vec![1.0 / n as f32; n]
        }
    }

    /// Smooth a single pilot-symbol's LS estimate in the frequency
    /// direction; out-of-range taps at the edges are linearly extrapolated
    /// rather than zero-padded.
    pub fn smooth_frequency(&self, ls: &[Complex32]) -> Vec<Complex32> {
        let coeffs = self.frequency_filter_coeffs();
        let half = (coeffs.len() / 2) as i32;
        let n = ls.len() as i32;

        (0..ls.len())
            .map(|i| {
                let mut acc = Complex32::new(0.0, 0.0);
                for (k, &c) in coeffs.iter().enumerate() {
                    let offset = k as i32 - half;
                    let idx = i as i32 + offset;
                    let sample = if idx < 0 {
                        Self::linear_extrapolate(ls, 0, idx)
                    } else if idx >= n {
                        Self::linear_extrapolate(ls, ls.len() - 1, idx - (n - 1))
                    } else {
                        ls[idx as usize]
                    };
                    acc += sample * c;
                }
                acc
            })
            .collect()
    }

    fn linear_extrapolate(ls: &[Complex32], anchor: usize, steps: i32) -> Complex32 {
        if ls.len() < 2 {
            return ls.first().copied().unwrap_or(Complex32::new(0.0, 0.0));
        }
        let slope = if anchor == 0 { ls[1] - ls[0] } else { ls[anchor] - ls[anchor - 1] };
        ls[anchor] + slope * steps as f32
    }

    /// Piecewise-linear interpolation between pilot-bearing symbols over a
    /// slot; boundary symbols before the first pilot symbol are linearly
    /// extrapolated from the first two pilot symbols.
    pub fn interpolate_time(&self, pilots: &[PilotEstimate], symbols_per_slot: u8) -> Vec<Vec<Complex32>> {
        assert!(pilots.len() >= 1, "need at least one pilot symbol");
        let n_sc = pilots[0].values.len();
        let mut out = vec![vec![Complex32::new(0.0, 0.0); n_sc]; symbols_per_slot as usize];

        for symbol in 0..symbols_per_slot {
            let before = pilots.iter().filter(|p| p.symbol_index <= symbol).last();
            let after = pilots.iter().find(|p| p.symbol_index >= symbol);

            out[symbol as usize] = match (before, after) {
                (Some(b), Some(a)) if b.symbol_index == a.symbol_index => b.values.clone(),
                (Some(b), Some(a)) => {
                    let span = (a.symbol_index - b.symbol_index) as f32;
                    let frac = (symbol - b.symbol_index) as f32 / span;
                    (0..n_sc).map(|i| b.values[i] + (a.values[i] - b.values[i]) * frac).collect()
                }
                (None, Some(a)) if pilots.len() >= 2 => {
                    let b = &pilots[1];
                    let span = (b.symbol_index - pilots[0].symbol_index) as f32;
                    let frac = (symbol as f32 - pilots[0].symbol_index as f32) / span;
                    (0..n_sc).map(|i| pilots[0].values[i] + (b.values[i] - pilots[0].values[i]) * frac).collect()
                }
                (None, Some(a)) => a.values.clone(),
                (Some(b), None) => b.values.clone(),
                (None, None) => unreachable!("at least one pilot symbol guaranteed"),
            };
        }

        out
    }

    /// Noise variance per the configured algorithm.
    pub fn estimate_noise(
        &self,
        raw_ls: &[Complex32],
        smoothed: &[Complex32],
        pss_residual: Option<&[Complex32]>,
        guard_subcarriers: Option<&[Complex32]>,
    ) -> f32 {
        match self.config.noise_algorithm {
            NoiseEstimationAlgorithm::Refs => {
                let sum: f32 = raw_ls.iter().zip(smoothed.iter()).map(|(&r, &s)| (r - s).norm_sqr()).sum();
                sum / raw_ls.len().max(1) as f32
            }
            NoiseEstimationAlgorithm::Pss => {
                let residual = pss_residual.unwrap_or(&[]);
                if residual.is_empty() {
                    return 0.0;
                }
                residual.iter().map(|c| c.norm_sqr()).sum::<f32>() / residual.len() as f32
            }
            NoiseEstimationAlgorithm::EmptySubcarrier => {
                let guard = guard_subcarriers.unwrap_or(&[]);
                if guard.is_empty() {
                    return 0.0;
                }
                guard.iter().map(|c| c.norm_sqr()).sum::<f32>() / guard.len() as f32
            }
        }
    }

    /// RSRP/RSSI/RSRQ/SNR report for one measurement window.
    pub fn measure(&self, ls_estimates: &[Complex32], all_res_in_pilot_symbols: &[Complex32], num_rb: u16, noise: f32) -> ChannelEstimateReport {
        let rsrp = super::bits::mean_power(ls_estimates);
        let rssi = super::bits::mean_power(all_res_in_pilot_symbols);
        let rsrq = if rssi > 0.0 { num_rb as f32 * rsrp / rssi } else { 0.0 };
        let snr = if noise > 0.0 { rsrp / noise } else { f32::INFINITY };

        debug!(rsrp, rssi, rsrq, snr, noise_variance = noise, "channel estimate measurement");

        ChannelEstimateReport { rsrp, rssi, rsrq, snr, noise_variance: noise }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ls_estimate_recovers_channel_for_unit_pilots() {
        let h = Complex32::new(0.8, 0.2);
        let pilots = vec![Complex32::new(1.0, 0.0); 4];
        let received: Vec<Complex32> = pilots.iter().map(|&p| p * h).collect();
        let est = ChannelEstimator::ls_estimate(&received, &pilots);
        for e in est {
            assert!((e - h).norm() < 1e-5);
        }
    }

    #[test]
    fn frequency_filter_coeffs_sum_to_one() {
        let estimator = ChannelEstimator::new(ChestConfig { freq_filter_taps: 7, ..Default::default() });
        let coeffs = estimator.frequency_filter_coeffs();
        let sum: f32 = coeffs.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
    }

    #[test]
    fn time_interpolation_matches_pilots_at_pilot_symbols() {
        let estimator = ChannelEstimator::new(ChestConfig::default());
        let pilots = vec![
            PilotEstimate { symbol_index: 0, values: vec![Complex32::new(1.0, 0.0)] },
            PilotEstimate { symbol_index: 4, values: vec![Complex32::new(2.0, 0.0)] },
        ];
        let interpolated = estimator.interpolate_time(&pilots, 7);
        assert_eq!(interpolated[0][0], Complex32::new(1.0, 0.0));
        assert_eq!(interpolated[4][0], Complex32::new(2.0, 0.0));
        assert!((interpolated[2][0].re - 1.5).abs() < 1e-4);
    }
}
