//! LDPC encoding/decoding for 5G NR PDSCH/PUSCH, TS 38.212 Section 5.3.2:
//! base graphs BG1/BG2, the lifting-size set, circular-buffer rate matching
//! with redundancy-version start offsets, and a layered offset-min-sum
//! decoder.
//!
//! The parity-check connectivity and circulant shift values are generated
//! from a deterministic formula rather than the literal 3GPP base-graph
//! connection tables (Tables 5.3.2-2/5.3.2-3, several hundred entries each,
//! not present anywhere in the reference material this crate draws on).
//! The generated matrix keeps the same quasi-cyclic, dual-diagonal-parity
//! family 3GPP actually uses, so encode and the layered decoder operate
//! over the same structure and round-trip — see DESIGN.md.

use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LdpcBaseGraph {
    BaseGraph1,
    BaseGraph2,
}

const LIFTING_SIZE_SET: [usize; 51] = [
    2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 18, 20, 22, 24, 26, 28, 30, 32, 36, 40, 44,
    48, 52, 56, 60, 64, 72, 80, 88, 96, 104, 112, 120, 128, 144, 160, 176, 192, 208, 224, 240, 256,
    288, 320, 352, 384,
];

pub const MAX_CB_SIZE_BG1: usize = 8448;
pub const MAX_CB_SIZE_BG2: usize = 3840;
const MAX_DECODE_ITERATIONS: usize = 8;

pub struct LdpcConfig {
    pub base_graph: LdpcBaseGraph,
    pub lifting_size: usize,
    /// Number of systematic columns (in Z-sized groups): 22 for BG1, 10 for BG2.
    pub k_b: usize,
    /// Total columns (systematic + parity), in Z-sized groups: 66/50.
    pub n_b: usize,
    pub num_info_bits: usize,
    pub num_encoded_bits: usize,
}

impl LdpcConfig {
    pub fn new(code_block_size: usize) -> Self {
        let base_graph =
            if code_block_size > 308 { LdpcBaseGraph::BaseGraph1 } else { LdpcBaseGraph::BaseGraph2 };

        let k_b = match base_graph {
            LdpcBaseGraph::BaseGraph1 => 22,
            LdpcBaseGraph::BaseGraph2 => 10,
        };
        let n_b = match base_graph {
            LdpcBaseGraph::BaseGraph1 => 66,
            LdpcBaseGraph::BaseGraph2 => 50,
        };

        let min_z = ((code_block_size as f32) / (k_b as f32)).ceil() as usize;
        let lifting_size = LIFTING_SIZE_SET.iter().find(|&&z| z >= min_z).copied().unwrap_or(384);

        Self {
            base_graph,
            lifting_size,
            k_b,
            n_b,
            num_info_bits: k_b * lifting_size,
            num_encoded_bits: n_b * lifting_size,
        }
    }

    pub fn parity_groups(&self) -> usize {
        self.n_b - self.k_b
    }
}

/// Quasi-cyclic base matrix: sparse per-row connectivity plus a circular
/// shift for each connected (row, column) pair, all in units of the Z-sized
/// circulant block.
struct BaseMatrix {
    /// `rows[r]` lists `(col, shift)` pairs connected in parity-check row `r`.
    rows: Vec<Vec<(usize, usize)>>,
}

impl BaseMatrix {
    fn generate(config: &LdpcConfig) -> Self {
        let z = config.lifting_size;
        let n_b = config.n_b;
        let m_b = config.parity_groups();
        let mut rows = Vec::with_capacity(m_b);

        for r in 0..m_b {
            let mut connections = Vec::new();
            // Deterministic sparse connectivity: every row touches the
            // single-parity accumulate column (k_b + 0), the staircase
            // column for this row (k_b + r), and a handful of systematic
            // columns chosen by a fixed residue pattern (degree ~3 per row
            // over the systematic part, matching BG1/BG2's typical column
            // weight).
            for c in 0..config.k_b {
                if (r * 7 + c * 11 + 3) % config.k_b < 3 {
                    let shift = (r * 3 + c * 5 + 1) % z;
                    connections.push((c, shift));
                }
            }
            // Dual-diagonal parity structure: column k_b connects to every
            // row (the degree-1 accumulate column), column k_b+r and
            // k_b+r+1 (mod parity_groups) form the staircase.
            connections.push((config.k_b, 0));
            connections.push((config.k_b + r, 0));
            if r + 1 < m_b {
                connections.push((config.k_b + r + 1, 0));
            }
            let _ = n_b;
            rows.push(connections);
        }

        Self { rows }
    }
}

fn circular_shift_group(group: &[u8], shift: usize) -> Vec<u8> {
    let z = group.len();
    if z == 0 {
        return Vec::new();
    }
    let shift = shift % z;
    let mut out = vec![0u8; z];
    for i in 0..z {
        out[(i + shift) % z] = group[i];
    }
    out
}

pub struct LdpcEncoder;

impl Default for LdpcEncoder {
    fn default() -> Self {
        Self
    }
}

impl LdpcEncoder {
    pub fn new() -> Self {
        Self
    }

    /// Encode one code block (`info` is exactly `config.num_info_bits`
    /// bits, one `bool` per bit) to `config.num_encoded_bits` bits.
    pub fn encode(&self, info: &[bool], config: &LdpcConfig) -> Vec<u8> {
        let z = config.lifting_size;
        debug!(
            base_graph = ?config.base_graph,
            z,
            k = config.num_info_bits,
            n = config.num_encoded_bits,
            "LDPC encode"
        );

        let info_bits: Vec<u8> = info.iter().map(|&b| b as u8).collect();
        let base = BaseMatrix::generate(config);
        let parity_groups = config.parity_groups();

        let info_groups: Vec<&[u8]> = (0..config.k_b).map(|g| &info_bits[g * z..(g + 1) * z]).collect();
        let mut parity_groups_bits: Vec<Vec<u8>> = vec![vec![0u8; z]; parity_groups];

        // Forward substitution over the dual-diagonal parity structure:
        // solve for parity group 0 from the systematic contributions of row
        // 0, then each subsequent parity group from its row plus the
        // previous parity group (the staircase connection).
        for r in 0..parity_groups {
            let mut acc = vec![0u8; z];
            for &(col, shift) in &base.rows[r] {
                if col < config.k_b {
                    let shifted = circular_shift_group(info_groups[col], shift);
                    for i in 0..z {
                        acc[i] ^= shifted[i];
                    }
                } else {
                    let parity_idx = col - config.k_b;
                    if parity_idx < r {
                        for i in 0..z {
                            acc[i] ^= parity_groups_bits[parity_idx][i];
                        }
                    }
                }
            }
            parity_groups_bits[r] = acc;
        }

        let mut encoded = vec![0u8; config.num_encoded_bits];
        encoded[..config.num_info_bits].copy_from_slice(&info_bits);
        for (g, group) in parity_groups_bits.iter().enumerate() {
            encoded[config.num_info_bits + g * z..config.num_info_bits + (g + 1) * z].copy_from_slice(group);
        }
        encoded
    }
}

/// Layered offset-min-sum LDPC decoder operating on bit LLRs (positive
/// favors bit 0), stopping early once `crc_ok` passes.
pub struct LdpcDecoder;

pub struct LdpcDecodeResult {
    pub bits: Vec<bool>,
    pub iterations_run: usize,
}

impl LdpcDecoder {
    const OFFSET: f32 = 0.15;

    pub fn decode(
        llrs: &[f32],
        config: &LdpcConfig,
        mut crc_ok: impl FnMut(&[bool]) -> bool,
    ) -> LdpcDecodeResult {
        let z = config.lifting_size;
        let base = BaseMatrix::generate(config);
        let n = config.num_encoded_bits;
        assert_eq!(llrs.len(), n);

        let mut posterior = llrs.to_vec();
        // Per-(row,col) messages, indexed by (row, position within row's
        // connection list), each holding a length-z vector of check-to-bit
        // messages.
        let mut check_msgs: Vec<Vec<Vec<f32>>> =
            base.rows.iter().map(|conns| vec![vec![0.0f32; z]; conns.len()]).collect();

        let mut hard_bits = vec![false; n];
        let mut iterations_run = 0;

        for iter in 0..MAX_DECODE_ITERATIONS {
            iterations_run = iter + 1;
            for (r, connections) in base.rows.iter().enumerate() {
                // Variable-to-check messages: posterior minus this check's
                // previous contribution.
                let var_msgs: Vec<Vec<f32>> = connections
                    .iter()
                    .enumerate()
                    .map(|(k, &(col, shift))| {
                        let base_pos = col * z;
                        (0..z)
                            .map(|i| {
                                let global = base_pos + (i + z - shift % z) % z;
                                posterior[global] - check_msgs[r][k][i]
                            })
                            .collect()
                    })
                    .collect();

                // Min-sum check-node update across the connections at each
                // of the z circulant phases.
                for i in 0..z {
                    let vals: Vec<f32> = var_msgs.iter().map(|v| v[i]).collect();
                    for k in 0..connections.len() {
                        let mut min1 = f32::INFINITY;
                        let mut sign = 1.0f32;
                        for (j, &v) in vals.iter().enumerate() {
                            if j == k {
                                continue;
                            }
                            sign *= v.signum();
                            min1 = min1.min(v.abs());
                        }
                        let magnitude = (min1 - Self::OFFSET).max(0.0);
                        check_msgs[r][k][i] = sign * magnitude;
                    }
                }

                // Fold the updated check messages back into the posterior.
                for (k, &(col, shift)) in connections.iter().enumerate() {
                    let base_pos = col * z;
                    for i in 0..z {
                        let global = base_pos + (i + z - shift % z) % z;
                        posterior[global] = var_msgs[k][i] + check_msgs[r][k][i];
                    }
                }
            }

            hard_bits = posterior[..n].iter().map(|&v| v < 0.0).collect();
            let info_bits = &hard_bits[..config.num_info_bits];
            if crc_ok(info_bits) {
                break;
            }
        }

        LdpcDecodeResult { bits: hard_bits[..config.num_info_bits].to_vec(), iterations_run }
    }
}

/// Circular-buffer rate matching with redundancy-version start offsets
/// (TS 38.212 Section 5.4.2.1).
pub struct LdpcRateMatcher;

impl LdpcRateMatcher {
    pub fn rate_match(&self, encoded_bits: &[u8], target_bits: usize, rv: u8, config: &LdpcConfig) -> Vec<u8> {
        let n = encoded_bits.len();
        let start_pos = match config.base_graph {
            LdpcBaseGraph::BaseGraph1 => match rv {
                0 => 0,
                1 => (17 * n) / 66,
                2 => (33 * n) / 66,
                3 => (56 * n) / 66,
                _ => 0,
            },
            LdpcBaseGraph::BaseGraph2 => match rv {
                0 => 0,
                1 => (13 * n) / 50,
                2 => (25 * n) / 50,
                3 => (43 * n) / 50,
                _ => 0,
            },
        };

        let mut output = vec![0u8; target_bits];
        for i in 0..target_bits {
            output[i] = encoded_bits[(start_pos + i) % n];
        }

        debug!(n, target_bits, rv, start_pos, "LDPC rate match");
        output
    }

    /// Invert rate matching on soft LLRs: sum contributions for any
    /// circular-buffer position read more than once (`target_bits > n`),
    /// leaving LLR 0 (erasure) for positions never transmitted.
    pub fn rate_dematch(&self, llrs: &[f32], n: usize, rv: u8, config: &LdpcConfig) -> Vec<f32> {
        let start_pos = match config.base_graph {
            LdpcBaseGraph::BaseGraph1 => match rv {
                0 => 0,
                1 => (17 * n) / 66,
                2 => (33 * n) / 66,
                3 => (56 * n) / 66,
                _ => 0,
            },
            LdpcBaseGraph::BaseGraph2 => match rv {
                0 => 0,
                1 => (13 * n) / 50,
                2 => (25 * n) / 50,
                3 => (43 * n) / 50,
                _ => 0,
            },
        };

        let mut out = vec![0.0f32; n];
        for (i, &v) in llrs.iter().enumerate() {
            out[(start_pos + i) % n] += v;
        }
        out
    }
}

/// Complete LDPC TX/RX chain for one PDSCH/PUSCH code block.
pub struct PdschLdpcEncoder {
    encoder: LdpcEncoder,
    rate_matcher: LdpcRateMatcher,
}

impl Default for PdschLdpcEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl PdschLdpcEncoder {
    pub fn new() -> Self {
        Self { encoder: LdpcEncoder::new(), rate_matcher: LdpcRateMatcher }
    }

    pub fn encode(&self, code_block: &[bool], target_bits: usize, rv: u8) -> Vec<u8> {
        let config = LdpcConfig::new(code_block.len());
        let mut padded = code_block.to_vec();
        padded.resize(config.num_info_bits, false);

        let encoded = self.encoder.encode(&padded, &config);
        self.rate_matcher.rate_match(&encoded, target_bits, rv, &config)
    }

    pub fn decode(
        &self,
        llrs: &[f32],
        info_bit_count: usize,
        rv: u8,
        crc_ok: impl FnMut(&[bool]) -> bool,
    ) -> LdpcDecodeResult {
        let config = LdpcConfig::new(info_bit_count);
        let dematched = self.rate_matcher.rate_dematch(llrs, config.num_encoded_bits, rv, &config);
        LdpcDecoder::decode(&dematched, &config, crc_ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn llrs_from_bits(bits: &[u8], confidence: f32) -> Vec<f32> {
        bits.iter().map(|&b| if b != 0 { -confidence } else { confidence }).collect()
    }

    #[test]
    fn config_selects_base_graph_by_size() {
        let small = LdpcConfig::new(200);
        assert_eq!(small.base_graph, LdpcBaseGraph::BaseGraph2);
        let large = LdpcConfig::new(4000);
        assert_eq!(large.base_graph, LdpcBaseGraph::BaseGraph1);
    }

    #[test]
    fn encode_rate_match_dematch_decode_roundtrip() {
        let info: Vec<bool> = (0..100).map(|i| i % 4 == 0).collect();
        let config = LdpcConfig::new(info.len());
        let mut padded = info.clone();
        padded.resize(config.num_info_bits, false);

        let encoder = LdpcEncoder::new();
        let encoded = encoder.encode(&padded, &config);
        assert_eq!(encoded.len(), config.num_encoded_bits);

        let rate_matcher = LdpcRateMatcher;
        let target_bits = config.num_encoded_bits;
        let rate_matched = rate_matcher.rate_match(&encoded, target_bits, 0, &config);
        let llrs = llrs_from_bits(&rate_matched, 10.0);
        let dematched = rate_matcher.rate_dematch(&llrs, config.num_encoded_bits, 0, &config);

        let result = LdpcDecoder::decode(&dematched, &config, |bits| bits == padded.as_slice());
        assert_eq!(&result.bits[..info.len()], info.as_slice());
    }
}
