//! CSI measurement and reporting: periodic/aperiodic triggers, CQI table
//! quantization, and NZP-CSI-RS exponential averaging.
//!
//! New module, teacher has none. Grounded on
//! `examples/original_source/srslte/lib/phch/csi.c` for the report-type
//! split and the CQI table selection.

use num_complex::Complex32;
use tracing::debug;

/// SINR-to-CQI-index breakpoints (dB), one table per modulation cap.
/// 16-entry tables (CQI 0 reserved for out-of-range / below table).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CqiTable {
    Qam64,
    Qam256,
    LowSpectralEfficiency,
}

impl CqiTable {
    /// SINR (dB) breakpoints, ascending, one per CQI index 1..=15.
    fn breakpoints(self) -> &'static [f32] {
        match self {
            CqiTable::Qam64 => &[
                -6.0, -4.0, -2.0, 0.0, 2.0, 4.0, 6.0, 8.0, 10.0, 12.0, 14.0, 16.0, 18.0, 20.0, 22.0,
            ],
            CqiTable::Qam256 => &[
                -6.0, -4.0, -2.0, 0.0, 2.0, 4.0, 6.0, 8.0, 10.0, 12.0, 14.0, 16.0, 18.0, 20.0, 22.5,
            ],
            CqiTable::LowSpectralEfficiency => &[
                -10.0, -8.0, -6.0, -4.0, -2.0, -1.0, 0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0,
            ],
        }
    }

    /// Map a wideband SINR (dB) to a CQI index 0..=15 under this table.
    pub fn quantize(self, sinr_db: f32) -> u8 {
        let breakpoints = self.breakpoints();
        let mut cqi = 0u8;
        for (i, &bp) in breakpoints.iter().enumerate() {
            if sinr_db >= bp {
                cqi = (i + 1) as u8;
            } else {
                break;
            }
        }
        cqi
    }
}

/// Per-report content configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportContent {
    /// Wideband channel-rank-indicator / rank-indicator / precoding-matrix
    /// indicator / channel-quality-indicator report.
    WidebandCriRiPmiCqi,
    /// No report requested; measurements still accumulate but nothing is
    /// produced for transmission.
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportTrigger {
    Periodic,
    Aperiodic,
}

#[derive(Debug, Clone)]
pub struct CsiReportConfig {
    pub trigger: ReportTrigger,
    pub content: ReportContent,
    pub cqi_table: CqiTable,
    /// Exponential-averaging factor applied to per-resource NZP-CSI-RS
    /// measurements before quantization.
    pub averaging_alpha: f32,
}

impl Default for CsiReportConfig {
    fn default() -> Self {
        Self {
            trigger: ReportTrigger::Periodic,
            content: ReportContent::WidebandCriRiPmiCqi,
            cqi_table: CqiTable::Qam64,
            averaging_alpha: 0.5,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct WidebandCsiReport {
    pub cri: u8,
    pub ri: u8,
    pub pmi: u8,
    pub cqi: u8,
}

/// Per-resource exponentially-averaged channel state, one per configured
/// NZP-CSI-RS resource.
#[derive(Debug, Clone, Default)]
pub struct CsiResourceState {
    averaged_power: Option<f32>,
}

impl CsiResourceState {
    /// Fold in one NZP-CSI-RS measurement window:
    /// `avg <- alpha * avg + (1 - alpha) * new` (first sample seeds the
    /// average directly).
    pub fn update(&mut self, measurement: &[Complex32], alpha: f32) {
        let power = super::bits::mean_power(measurement);
        self.averaged_power = Some(match self.averaged_power {
            Some(prev) => alpha * prev + (1.0 - alpha) * power,
            None => power,
        });
    }

    pub fn averaged_power(&self) -> f32 {
        self.averaged_power.unwrap_or(0.0)
    }
}

pub struct CsiReporter {
    config: CsiReportConfig,
    resources: Vec<CsiResourceState>,
}

impl CsiReporter {
    pub fn new(config: CsiReportConfig, num_resources: usize) -> Self {
        Self { config, resources: vec![CsiResourceState::default(); num_resources] }
    }

    /// Fold a measurement window into resource `resource_idx`'s running
    /// average.
    pub fn observe(&mut self, resource_idx: usize, measurement: &[Complex32]) {
        if let Some(state) = self.resources.get_mut(resource_idx) {
            state.update(measurement, self.config.averaging_alpha);
        }
    }

    /// Produce the configured report from the best (highest-averaged-power)
    /// resource; `None` content yields `None` regardless of trigger.
    pub fn build_report(&self, noise_power: f32) -> Option<WidebandCsiReport> {
        if self.config.content == ReportContent::None {
            return None;
        }

        let (best_idx, best_power) = self
            .resources
            .iter()
            .enumerate()
            .map(|(i, r)| (i, r.averaged_power()))
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))?;

        let sinr_db = if noise_power > 0.0 {
            10.0 * (best_power / noise_power).log10()
        } else {
            99.0
        };
        let cqi = self.config.cqi_table.quantize(sinr_db);

        debug!(best_idx, sinr_db, cqi, "CSI report built");

        Some(WidebandCsiReport { cri: best_idx as u8, ri: 1, pmi: 0, cqi })
    }

    pub fn trigger(&self) -> ReportTrigger {
        self.config.trigger
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantize_is_monotonic_with_sinr() {
        let table = CqiTable::Qam64;
        assert!(table.quantize(-20.0) == 0);
        assert!(table.quantize(20.0) > table.quantize(0.0));
    }

    #[test]
    fn resource_state_averages_exponentially() {
        let mut state = CsiResourceState::default();
        let high = vec![Complex32::new(2.0, 0.0); 4];
        let low = vec![Complex32::new(0.0, 0.0); 4];
        state.update(&high, 0.5);
        assert!((state.averaged_power() - 4.0).abs() < 1e-5);
        state.update(&low, 0.5);
        assert!((state.averaged_power() - 2.0).abs() < 1e-5);
    }

    #[test]
    fn none_content_suppresses_report() {
        let config = CsiReportConfig { content: ReportContent::None, ..Default::default() };
        let reporter = CsiReporter::new(config, 1);
        assert!(reporter.build_report(1.0).is_none());
    }

    #[test]
    fn best_resource_drives_the_report() {
        let config = CsiReportConfig::default();
        let mut reporter = CsiReporter::new(config, 2);
        reporter.observe(0, &vec![Complex32::new(0.1, 0.0); 4]);
        reporter.observe(1, &vec![Complex32::new(5.0, 0.0); 4]);
        let report = reporter.build_report(1.0).unwrap();
        assert_eq!(report.cri, 1);
    }
}
