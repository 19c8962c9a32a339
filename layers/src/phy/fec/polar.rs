//! Polar coding for 5G NR control channels (PBCH, PDCCH), TS 38.212
//! Section 5.3.1: reliability-sequence bit allocation, the XOR butterfly
//! encoder, sub-block interleaving, puncture/shorten/repeat rate matching,
//! the triangular channel interleaver, and a soft-input successive
//! cancellation list (SCL) decoder.
//!
//! The reliability sequence is generated from a bit-reversal + Gaussian
//! polarization-weight approximation rather than the literal 3GPP
//! Table 5.3.1.2-1 (a 1024-entry fixed table not present anywhere in the
//! reference material this module draws on) — see DESIGN.md.

/// Maximum Polar code length (log2)
pub const NMAX_LOG: usize = 10;
/// Maximum Polar code length
pub const NMAX: usize = 1 << NMAX_LOG;

/// A configured Polar code instance: code length N, information length K,
/// and the target rate-matched output length E.
pub struct PolarCode {
    n: usize,
    k: usize,
    e: usize,
    n_log: usize,
    /// `true` at index i means position i (in the N-length codeword) is an
    /// information bit; `false` means it is frozen to 0.
    is_info: Vec<bool>,
    block_interleaver: Vec<usize>,
}

impl PolarCode {
    pub fn new(k: usize, e: usize, n_max_log: usize) -> Self {
        let n_log = Self::calculate_n_log(k, e, n_max_log);
        let n = 1 << n_log;
        let reliability_sequence = Self::generate_reliability_sequence(n);
        let is_info = Self::allocate_bits(n, k, &reliability_sequence);
        let block_interleaver = Self::generate_block_interleaver(n);

        Self { n, k, e, n_log, is_info, block_interleaver }
    }

    fn calculate_n_log(k: usize, e: usize, n_max_log: usize) -> usize {
        let min_n = k.max(e / 2).max(1);
        for n_log in 5..=n_max_log {
            if (1 << n_log) >= min_n {
                return n_log;
            }
        }
        n_max_log
    }

    fn bit_reversal(val: usize, n_bits: usize) -> usize {
        let mut result = 0;
        let mut v = val;
        for _ in 0..n_bits {
            result = (result << 1) | (v & 1);
            v >>= 1;
        }
        result
    }

    fn generate_reliability_sequence(n: usize) -> Vec<usize> {
        let n_log = n.trailing_zeros() as usize;
        let mut w = vec![0f64; n];
        for j in 0..n {
            w[j] = Self::bit_reversal(j, n_log) as f64;
        }
        for s in 1..=n_log {
            let increment = 1 << (n_log - s);
            for j in 0..increment {
                for t in 0..(1 << (s - 1)) {
                    let idx1 = j + t * 2 * increment;
                    let idx2 = idx1 + increment;
                    let (w1, w2) = (w[idx1], w[idx2]);
                    w[idx1] = w1 + w2;
                    w[idx2] = w2;
                }
            }
        }
        let mut indices: Vec<usize> = (0..n).collect();
        indices.sort_by(|&a, &b| w[a].partial_cmp(&w[b]).unwrap());
        indices
    }

    fn allocate_bits(n: usize, k: usize, reliability_sequence: &[usize]) -> Vec<bool> {
        let mut is_info = vec![false; n];
        for &pos in reliability_sequence.iter().rev().take(k) {
            is_info[pos] = true;
        }
        is_info
    }

    fn generate_block_interleaver(n: usize) -> Vec<usize> {
        if n < 32 {
            return (0..n).collect();
        }
        let rows = 32;
        let cols = n / rows;
        let mut pattern = Vec::with_capacity(n);
        for c in 0..cols {
            for r in 0..rows {
                pattern.push(r * cols + c);
            }
        }
        pattern
    }

    pub fn n(&self) -> usize {
        self.n
    }
    pub fn k(&self) -> usize {
        self.k
    }
    pub fn e(&self) -> usize {
        self.e
    }
    pub fn is_info(&self) -> &[bool] {
        &self.is_info
    }
}

/// In-place XOR butterfly transform: `x = u * G_N` for the non-bit-reversed
/// Arikan construction, the same recursion used to both encode and, in
/// reverse stage order, invert a noiseless codeword.
fn polar_transform(bits: &mut [u8]) {
    let n = bits.len();
    let n_log = n.trailing_zeros();
    for s in 1..=n_log {
        let half_stage = 1usize << (s - 1);
        let full_stage = 1usize << s;
        let mut j = 0;
        while j < n {
            for i in 0..half_stage {
                bits[j + i] ^= bits[j + i + half_stage];
            }
            j += full_stage;
        }
    }
}

pub struct PolarEncoder;

impl PolarEncoder {
    /// Encode `k` information bits (already CRC-attached) against `code`,
    /// producing the full N-length codeword.
    pub fn encode(info_bits: &[bool], code: &PolarCode) -> Vec<u8> {
        assert_eq!(info_bits.len(), code.k());
        let mut u = vec![0u8; code.n()];
        let mut info_idx = 0;
        for (i, &is_info) in code.is_info.iter().enumerate() {
            if is_info {
                u[i] = info_bits[info_idx] as u8;
                info_idx += 1;
            }
        }
        polar_transform(&mut u);
        u
    }
}

pub struct PolarRateMatcher;

impl PolarRateMatcher {
    /// Rate match an N-length codeword down (or up) to E bits: sub-block
    /// interleave, then puncture (16K<=7E), shorten, or repeat, then the
    /// triangular channel interleaver.
    pub fn rate_match(codeword: &[u8], code: &PolarCode) -> Vec<u8> {
        let n = code.n();
        let e = code.e();
        let k = code.k();

        let mut interleaved = vec![0u8; n];
        for (i, &src) in code.block_interleaver.iter().enumerate() {
            interleaved[i] = codeword[src];
        }

        let selected = if e >= n {
            (0..e).map(|i| interleaved[i % n]).collect::<Vec<_>>()
        } else if 16 * k <= 7 * e {
            interleaved[(n - e)..].to_vec()
        } else {
            interleaved[..e].to_vec()
        };

        Self::channel_interleave(&selected)
    }

    fn triangular_rows(e: usize) -> usize {
        let mut t = 1;
        let mut s = 1;
        while s < e {
            t += 1;
            s += t;
        }
        t
    }

    fn channel_interleave(input: &[u8]) -> Vec<u8> {
        let e = input.len();
        let t = Self::triangular_rows(e);
        let mut output = vec![0u8; e];
        let mut out_idx = 0;
        for r in 0..t {
            let mut in_idx = r;
            let mut step = t;
            while in_idx < e {
                output[out_idx] = input[in_idx];
                out_idx += 1;
                in_idx += step;
                step -= 1;
            }
        }
        output
    }

    /// Channel-interleaver read order as a permutation: `order[out] = in`.
    fn channel_interleave_order(e: usize) -> Vec<usize> {
        let t = Self::triangular_rows(e);
        let mut order = Vec::with_capacity(e);
        for r in 0..t {
            let mut in_idx = r;
            let mut step = t;
            while in_idx < e {
                order.push(in_idx);
                in_idx += step;
                step -= 1;
            }
        }
        order
    }

    /// Invert rate matching on soft LLRs: undoes the channel interleaver,
    /// combines (sums) repeated LLRs or fills erasure/forced-zero LLRs for
    /// punctured/shortened positions, then undoes the sub-block
    /// interleaver, returning an N-length LLR vector in codeword order.
    pub fn rate_dematch(llrs: &[f32], code: &PolarCode) -> Vec<f32> {
        let n = code.n();
        let e = code.e();
        let k = code.k();
        assert_eq!(llrs.len(), e);

        let order = Self::channel_interleave_order(e);
        let mut selected = vec![0.0f32; e];
        for (out_pos, &in_pos) in order.iter().enumerate() {
            selected[in_pos] = llrs[out_pos];
        }

        let mut interleaved = vec![0.0f32; n];
        if e >= n {
            for (i, &v) in selected.iter().enumerate() {
                interleaved[i % n] += v;
            }
        } else if 16 * k <= 7 * e {
            // Punctured positions (first n-e) are erasures: LLR 0.
            for (i, &v) in selected.iter().enumerate() {
                interleaved[n - e + i] = v;
            }
        } else {
            // Shortened positions (last n-e) are forced to 0: strong
            // positive LLR.
            for i in e..n {
                interleaved[i] = 1.0e6;
            }
            interleaved[..e].copy_from_slice(&selected);
        }

        let mut natural = vec![0.0f32; n];
        for (i, &src) in code.block_interleaver.iter().enumerate() {
            natural[src] = interleaved[i];
        }
        natural
    }
}

/// A candidate decode path carried through the SCL recursion.
#[derive(Clone)]
struct ListPath {
    bits: Vec<u8>,
    metric: f64,
}

fn bit_penalty(bit: u8, llr: f32) -> f64 {
    let agrees = (bit == 0 && llr >= 0.0) || (bit == 1 && llr < 0.0);
    if agrees { 0.0 } else { llr.abs() as f64 }
}

fn f_combine(a: f32, b: f32) -> f32 {
    a.signum() * b.signum() * a.abs().min(b.abs())
}

fn g_combine(a: f32, b: f32, v1_hat: u8) -> f32 {
    if v1_hat == 0 { b + a } else { b - a }
}

fn scl_recurse(llr: &[f32], is_info: &[bool], list_size: usize) -> Vec<ListPath> {
    let n = llr.len();
    if n == 1 {
        return if !is_info[0] {
            vec![ListPath { bits: vec![0], metric: bit_penalty(0, llr[0]) }]
        } else {
            vec![
                ListPath { bits: vec![0], metric: bit_penalty(0, llr[0]) },
                ListPath { bits: vec![1], metric: bit_penalty(1, llr[0]) },
            ]
        };
    }

    let half = n / 2;
    let (y1, y2) = llr.split_at(half);
    let f_llr: Vec<f32> = (0..half).map(|i| f_combine(y1[i], y2[i])).collect();

    let mut u1_candidates = scl_recurse(&f_llr, &is_info[..half], list_size);
    u1_candidates.sort_by(|a, b| a.metric.partial_cmp(&b.metric).unwrap());
    u1_candidates.truncate(list_size);

    let mut combined = Vec::new();
    for u1 in &u1_candidates {
        let mut v1_hat = u1.bits.clone();
        polar_transform(&mut v1_hat);
        let g_llr: Vec<f32> = (0..half).map(|i| g_combine(y1[i], y2[i], v1_hat[i])).collect();

        let u2_candidates = scl_recurse(&g_llr, &is_info[half..], list_size);
        for u2 in u2_candidates {
            let mut bits = u1.bits.clone();
            bits.extend(u2.bits);
            combined.push(ListPath { bits, metric: u1.metric + u2.metric });
        }
    }

    combined.sort_by(|a, b| a.metric.partial_cmp(&b.metric).unwrap());
    combined.truncate(list_size);
    combined
}

pub struct PolarDecoder;

impl PolarDecoder {
    /// Default list size used throughout the control-channel decode paths.
    pub const DEFAULT_LIST_SIZE: usize = 8;

    /// Run SCL decoding over the N-length codeword-domain LLRs, returning
    /// up to `list_size` candidate information-bit vectors ordered by path
    /// metric (best first).
    pub fn decode_list(llrs: &[f32], code: &PolarCode, list_size: usize) -> Vec<Vec<bool>> {
        let paths = scl_recurse(llrs, code.is_info(), list_size);
        paths
            .into_iter()
            .map(|p| {
                code.is_info()
                    .iter()
                    .zip(p.bits.iter())
                    .filter_map(|(&is_info, &b)| is_info.then_some(b != 0))
                    .collect()
            })
            .collect()
    }

    /// Decode and pick the first candidate (in metric order) whose
    /// information bits pass `crc_ok`; falls back to the best-metric
    /// candidate if none pass.
    pub fn decode_with_crc(
        llrs: &[f32],
        code: &PolarCode,
        list_size: usize,
        mut crc_ok: impl FnMut(&[bool]) -> bool,
    ) -> Vec<bool> {
        let candidates = Self::decode_list(llrs, code, list_size);
        for cand in &candidates {
            if crc_ok(cand) {
                return cand.clone();
            }
        }
        candidates.into_iter().next().unwrap_or_default()
    }
}

/// Complete Polar TX chain for PDCCH DCI payloads (CRC-attached input to
/// rate-matched output bits).
pub struct PdcchPolarEncoder;

impl PdcchPolarEncoder {
    pub fn new() -> Self {
        Self
    }

    pub fn encode(&self, payload_with_crc: &[u8], aggregation_level: u8) -> Vec<u8> {
        let e = aggregation_level as usize * 6 * 12 * 2;
        let k = payload_with_crc.len();
        let code = PolarCode::new(k, e, NMAX_LOG - 1);

        let info_bits: Vec<bool> = payload_with_crc.iter().map(|&b| b != 0).collect();
        let codeword = PolarEncoder::encode(&info_bits, &code);
        PolarRateMatcher::rate_match(&codeword, &code)
    }
}

impl Default for PdcchPolarEncoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn llrs_from_bits(bits: &[u8], confidence: f32) -> Vec<f32> {
        bits.iter().map(|&b| if b != 0 { -confidence } else { confidence }).collect()
    }

    #[test]
    fn encode_rate_match_dematch_decode_roundtrip() {
        let k = 32;
        let e = 108;
        let code = PolarCode::new(k, e, NMAX_LOG - 1);
        assert_eq!(code.k(), k);

        let info: Vec<bool> = (0..k).map(|i| i % 3 == 0).collect();
        let codeword = PolarEncoder::encode(&info, &code);
        let rate_matched = PolarRateMatcher::rate_match(&codeword, &code);
        assert_eq!(rate_matched.len(), e);

        let llrs = llrs_from_bits(&rate_matched, 8.0);
        let natural_llr = PolarRateMatcher::rate_dematch(&llrs, &code);
        let decoded = PolarDecoder::decode_with_crc(&natural_llr, &code, 8, |_| true);

        assert_eq!(decoded, info);
    }

    #[test]
    fn scl_list_is_bounded_by_list_size() {
        let code = PolarCode::new(16, 64, NMAX_LOG - 1);
        let llrs = vec![0.1f32; code.n()];
        let candidates = PolarDecoder::decode_list(&llrs, &code, 4);
        assert!(candidates.len() <= 4);
    }
}
