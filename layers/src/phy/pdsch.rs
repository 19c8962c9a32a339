//! PDSCH (Physical Downlink Shared Channel), TS 38.211, 38.212, 38.214.

use crate::LayerError;
use common::types::{CellConfig, ModulationScheme};
use num_complex::Complex32;
use tracing::{debug, info, warn};
use std::sync::Arc;
use super::fec::crc::{crc_attach, crc_check, CrcKind};
use super::fec::ldpc::PdschLdpcEncoder;
use super::bits::{pack_bits, unpack_bits};
use super::harq::HarqSoftBuffer;
use super::dmrs::{calculate_pdsch_dmrs_cinit, generate_dmrs_sequence, DmrsSequenceGenerator, DmrsType, get_pdsch_dmrs_params, apply_cdm_weights};

/// PDSCH configuration
#[derive(Debug, Clone)]
pub struct PdschConfig {
    /// Transport block size in bytes
    pub tbs_bytes: usize,
    /// Modulation scheme
    pub modulation: ModulationScheme,
    /// Number of layers
    pub num_layers: u8,
    /// Redundancy version
    pub rv: u8,
    /// LDPC base graph (1 or 2)
    pub ldpc_base_graph: u8,
    /// New data indicator
    pub ndi: bool,
    /// HARQ process ID
    pub harq_id: u8,
    /// Frequency allocation (PRBs)
    pub prb_allocation: Vec<u16>,
    /// Time allocation (start symbol and length)
    pub start_symbol: u8,
    pub num_symbols: u8,
    /// DMRS configuration
    pub dmrs_type: u8,
    pub dmrs_additional_pos: u8,
    pub dmrs_config_type: u8,
    /// Scrambling ID
    pub n_id: u16,
    /// RNTI
    pub rnti: u16,
    /// Code block size (for rate matching)
    pub code_block_size: usize,
}

/// Transport block processing result
pub struct TransportBlockResult {
    /// Encoded and rate-matched bits (one bit per element, 0/1)
    pub encoded_bits: Vec<u8>,
    /// Number of code blocks
    pub num_code_blocks: usize,
    /// Code block size in bits
    pub code_block_size: usize,
}

/// Result of decoding a received transport block.
pub struct TransportBlockDecodeResult {
    /// Decoded payload bytes (CRC stripped), empty if decoding failed.
    pub payload: Vec<u8>,
    /// Whether the transport-block (or, for a single code block, code-block)
    /// CRC verified.
    pub crc_ok: bool,
    /// Per-code-block decode iteration counts, for HARQ/logging.
    pub cb_iterations: Vec<usize>,
}

/// PDSCH processor
#[derive(Clone)]
pub struct PdschProcessor {
    cell_config: Arc<CellConfig>,
}

impl PdschProcessor {
    pub fn new(cell_config: Arc<CellConfig>) -> Self {
        Self { cell_config }
    }

    /// Process PDSCH for SIB1 transmission
    pub fn process_sib1_pdsch(
        &self,
        resource_grid: &mut super::resource_grid::ResourceGrid,
        sib1_payload: &[u8],
        config: &PdschConfig,
    ) -> Result<(), LayerError> {
        info!(
            "Processing PDSCH for SIB1: TBS={} bytes, MCS={:?}, RBs={}",
            config.tbs_bytes,
            config.modulation,
            config.prb_allocation.len()
        );

        let tb_result = self.process_transport_block(sib1_payload, config);
        let scrambled_bits = self.scramble_bits(&tb_result.encoded_bits, config);
        let modulated_symbols = self.modulate_bits(&scrambled_bits, config.modulation);
        let layers = self.layer_mapping(&modulated_symbols, config.num_layers)?;
        // This crate's `ResourceGrid` carries a single antenna-port plane
        // (see `resource_grid.rs`), so there is nowhere to map a second
        // layer's symbols: single-antenna transmission is a pass-through
        // per spec, spatial-multiplexing precoding onto additional RF
        // ports is out of scope for this resource grid.
        let single_layer = layers.into_iter().next().ok_or_else(|| {
            LayerError::InvalidConfiguration("layer mapping produced no layers".to_string())
        })?;
        self.map_to_resource_grid(resource_grid, &single_layer, config);
        self.generate_pdsch_dmrs(resource_grid, config);
        Ok(())
    }

    /// Process transport block with CRC attachment, segmentation, and LDPC encoding
    fn process_transport_block(&self, payload: &[u8], config: &PdschConfig) -> TransportBlockResult {
        let payload_bits = unpack_bits(payload);

        let tb_with_crc = if payload_bits.len() > 3824 {
            crc_attach(&payload_bits, CrcKind::Crc24A)
        } else {
            payload_bits
        };

        let (code_blocks, cb_size) = self.segment_transport_block(&tb_with_crc, config.ldpc_base_graph);

        let total_res = self.calculate_available_res(config);
        let total_bits = total_res * self.get_bits_per_symbol(config.modulation);
        let bits_per_cb = total_bits / code_blocks.len();

        let mut all_encoded_bits = Vec::new();
        let ldpc_encoder = PdschLdpcEncoder::new();

        for code_block in &code_blocks {
            let cb_with_crc = if code_blocks.len() > 1 {
                crc_attach(code_block, CrcKind::Crc24B)
            } else {
                code_block.clone()
            };

            let rate_matched = ldpc_encoder.encode(&cb_with_crc, bits_per_cb, config.rv);
            all_encoded_bits.extend(rate_matched);
        }

        debug!(
            "Transport block processed: {} code blocks, {} total encoded bits",
            code_blocks.len(),
            all_encoded_bits.len()
        );

        TransportBlockResult {
            encoded_bits: all_encoded_bits,
            num_code_blocks: code_blocks.len(),
            code_block_size: cb_size,
        }
    }

    /// Number of code blocks and per-code-block bit count a transport block
    /// of `tb_size_bits` (already including its own TB CRC, if any) segments
    /// into for `base_graph`. Shared by the TX segmenter and the RX
    /// reassembly path so the two can never disagree on code-block shape.
    fn cb_sizing(tb_size_bits: usize, base_graph: u8) -> (usize, usize) {
        let max_cb_size = if base_graph == 1 { 8448 } else { 3840 };

        let num_cb = if tb_size_bits <= max_cb_size {
            1
        } else {
            ((tb_size_bits as f32) / (max_cb_size as f32 - 24.0)).ceil() as usize
        };

        let cb_size_bits = if num_cb == 1 {
            tb_size_bits
        } else {
            let total_bits = tb_size_bits + 24 * num_cb;
            (total_bits + num_cb - 1) / num_cb
        };

        (num_cb, cb_size_bits)
    }

    /// Segment the CRC-attached transport block (bits) into code blocks
    fn segment_transport_block(&self, tb_bits: &[bool], base_graph: u8) -> (Vec<Vec<bool>>, usize) {
        let (num_cb, cb_size_bits) = Self::cb_sizing(tb_bits.len(), base_graph);

        let mut code_blocks = Vec::new();
        for i in 0..num_cb {
            let start = i * cb_size_bits;
            let end = ((i + 1) * cb_size_bits).min(tb_bits.len());

            let mut cb = tb_bits[start..end].to_vec();
            cb.resize(cb_size_bits, false);
            code_blocks.push(cb);
        }

        (code_blocks, cb_size_bits)
    }

    /// Scramble bits with the PDSCH scrambling sequence
    fn scramble_bits(&self, bits: &[u8], config: &PdschConfig) -> Vec<u8> {
        let c_init = self.calculate_scrambling_cinit(config);
        let mut generator = DmrsSequenceGenerator::new(c_init);

        bits.iter().map(|&bit| bit ^ generator.next_bit()).collect()
    }

    /// Modulate bits to complex symbols
    fn modulate_bits(&self, bits: &[u8], modulation: ModulationScheme) -> Vec<num_complex::Complex32> {
        let bits_per_symbol = self.get_bits_per_symbol(modulation);
        bits.chunks(bits_per_symbol)
            .filter(|chunk| chunk.len() == bits_per_symbol)
            .map(|chunk| {
                let mut packed = 0u8;
                for &b in chunk {
                    packed = (packed << 1) | (b & 1);
                }
                match modulation {
                    ModulationScheme::Qpsk => self.modulate_qpsk(packed),
                    ModulationScheme::Qam16 => self.modulate_16qam(packed),
                    ModulationScheme::Qam64 => self.modulate_64qam(packed),
                    ModulationScheme::Qam256 => self.modulate_256qam(packed),
                }
            })
            .collect()
    }

    /// Layer-map modulated symbols per TS 38.211 section 7.3.1.3: a single
    /// layer is the identity mapping (single-antenna pass-through, per
    /// spec); for `num_layers > 1` symbols are demultiplexed round-robin
    /// across layers (spatial multiplexing differs from single-antenna
    /// only in this demux plus the precoder, never in channel coding).
    /// Errors for `num_layers > 1` because the only caller maps onto a
    /// `ResourceGrid` with no antenna-port dimension to carry the
    /// additional layers' precoded output.
    fn layer_mapping(&self, symbols: &[Complex32], num_layers: u8) -> Result<Vec<Vec<Complex32>>, LayerError> {
        if num_layers == 0 {
            return Err(LayerError::InvalidConfiguration("num_layers must be >= 1".to_string()));
        }
        let num_layers = num_layers as usize;
        if num_layers > 1 {
            return Err(LayerError::InvalidConfiguration(format!(
                "spatial multiplexing with {num_layers} layers requires a multi-antenna-port resource grid, which this PDSCH path does not have"
            )));
        }

        let mut layers: Vec<Vec<Complex32>> = vec![Vec::with_capacity(symbols.len().div_ceil(num_layers)); num_layers];
        for (i, &sym) in symbols.iter().enumerate() {
            layers[i % num_layers].push(sym);
        }
        Ok(layers)
    }

    /// Map symbols to resource grid
    fn map_to_resource_grid(
        &self,
        resource_grid: &mut super::resource_grid::ResourceGrid,
        symbols: &[num_complex::Complex32],
        config: &PdschConfig,
    ) {
        let mut symbol_idx = 0;

        for ofdm_symbol in config.start_symbol..config.start_symbol + config.num_symbols {
            if self.is_dmrs_symbol(ofdm_symbol, config) {
                continue;
            }

            for prb in &config.prb_allocation {
                for subcarrier in 0..12 {
                    let re_idx = *prb as usize * 12 + subcarrier;

                    if symbol_idx < symbols.len() {
                        let _ = resource_grid.map_re(re_idx as u16, ofdm_symbol, symbols[symbol_idx]);
                        symbol_idx += 1;
                    }
                }
            }
        }

        info!("Mapped {} PDSCH symbols to resource grid", symbol_idx);
    }

    /// Generate DMRS for PDSCH
    fn generate_pdsch_dmrs(
        &self,
        resource_grid: &mut super::resource_grid::ResourceGrid,
        config: &PdschConfig,
    ) {
        const DMRS_AMPLITUDE: f32 = 0.7071067811865476;
        let dmrs_type = DmrsType::Type1;
        let dmrs_port = 0;
        let n_scid = false;

        let (dmrs_positions, dmrs_weights) = get_pdsch_dmrs_params(dmrs_type, dmrs_port);

        for ofdm_symbol in config.start_symbol..config.start_symbol + config.num_symbols {
            if !self.is_dmrs_symbol(ofdm_symbol, config) {
                continue;
            }

            let slot = 0;
            let c_init = calculate_pdsch_dmrs_cinit(slot, ofdm_symbol, config.n_id, n_scid);
            let mut generator = DmrsSequenceGenerator::new(c_init);

            let mut rb_mask = vec![false; 275];
            for &prb in &config.prb_allocation {
                if (prb as usize) < rb_mask.len() {
                    rb_mask[prb as usize] = true;
                }
            }

            let base_sequence = generate_dmrs_sequence(
                &rb_mask,
                0,
                dmrs_type.nof_dmrs_per_rb(),
                &mut generator,
                DMRS_AMPLITUDE,
            );

            let dmrs_sequence = if dmrs_port == 0 {
                base_sequence
            } else {
                let l_prime = if ofdm_symbol == config.start_symbol { 0 } else { 1 };
                apply_cdm_weights(&base_sequence, &dmrs_weights, l_prime)
            };

            let mut dmrs_idx = 0;
            for &prb in &config.prb_allocation {
                if dmrs_idx + dmrs_positions.len() <= dmrs_sequence.len() {
                    for (pos_idx, &k) in dmrs_positions.iter().enumerate() {
                        let _ = resource_grid.map_re(
                            prb * 12 + k as u16,
                            ofdm_symbol,
                            dmrs_sequence[dmrs_idx + pos_idx],
                        );
                    }
                    dmrs_idx += dmrs_positions.len();
                }
            }
        }

        debug!("Generated PDSCH DMRS (Type 1, port {}) for {} PRBs", dmrs_port, config.prb_allocation.len());
    }

    /// Decode a received PDSCH transport block: the inverse of
    /// `process_sib1_pdsch`'s TX chain (equalize -> LLR demap -> descramble
    /// -> rate-dematch into the HARQ soft buffer -> LDPC decode with
    /// early-stop CRC -> code-block concatenation -> TB CRC verify).
    ///
    /// `channel_estimate` holds one coefficient per extracted data RE (same
    /// order `extract_pdsch_res` produces); `noise_variance` is the
    /// subframe's estimated noise power used to scale the max-log LLRs.
    /// `harq_buffers` holds one soft-combining buffer per code block,
    /// growing to match the transport block's code-block count; RV=0
    /// resets each buffer, any other RV accumulates soft bits onto the
    /// previous transmission's (see `harq::HarqSoftBuffer`).
    pub fn decode_pdsch(
        &self,
        resource_grid: &super::resource_grid::ResourceGrid,
        channel_estimate: &[Complex32],
        noise_variance: f32,
        config: &PdschConfig,
        harq_buffers: &mut Vec<HarqSoftBuffer>,
    ) -> TransportBlockDecodeResult {
        let payload_bits_len = config.tbs_bytes * 8;
        let has_tb_crc = payload_bits_len > 3824;
        let tb_size_bits = payload_bits_len + if has_tb_crc { 24 } else { 0 };
        let (num_cb, cb_size_bits) = Self::cb_sizing(tb_size_bits, config.ldpc_base_graph);

        let total_res = self.calculate_available_res(config);
        let total_bits = total_res * self.get_bits_per_symbol(config.modulation);
        let bits_per_cb = total_bits / num_cb;

        let rx_symbols = self.extract_pdsch_res(resource_grid, config);
        let equalized = self.equalize(&rx_symbols, channel_estimate);
        let llrs = self.demap_bits(&equalized, config.modulation, noise_variance);
        let descrambled = self.descramble_llrs(&llrs, config);

        if harq_buffers.len() < num_cb {
            harq_buffers.resize_with(num_cb, HarqSoftBuffer::default);
        }

        let ldpc_encoder = PdschLdpcEncoder::new();
        let mut concatenated = Vec::with_capacity(num_cb * cb_size_bits);
        let mut cb_iterations = Vec::with_capacity(num_cb);
        let mut all_cb_crc_ok = true;

        for (cb_idx, cb_llrs) in descrambled.chunks(bits_per_cb).take(num_cb).enumerate() {
            harq_buffers[cb_idx].combine(cb_llrs, config.rv);
            let combined_llrs = harq_buffers[cb_idx].llrs().to_vec();

            let info_bit_count = if num_cb > 1 { cb_size_bits + 24 } else { cb_size_bits };
            let mut cb_crc_ok = num_cb == 1;
            let result = ldpc_encoder.decode(&combined_llrs, info_bit_count, config.rv, |bits| {
                if num_cb > 1 {
                    cb_crc_ok = crc_check(bits, CrcKind::Crc24B);
                    cb_crc_ok
                } else {
                    // No per-CB CRC to early-stop on; run the full
                    // iteration budget and rely on the TB CRC (if any).
                    false
                }
            });

            cb_iterations.push(result.iterations_run);
            all_cb_crc_ok &= cb_crc_ok;
            concatenated.extend_from_slice(&result.bits[..cb_size_bits]);
        }
        concatenated.truncate(tb_size_bits);

        let crc_ok = if has_tb_crc {
            concatenated.len() == tb_size_bits && crc_check(&concatenated, CrcKind::Crc24A)
        } else {
            all_cb_crc_ok
        };

        let payload_bits = if concatenated.len() >= payload_bits_len {
            &concatenated[..payload_bits_len]
        } else {
            warn!("decoded transport block shorter than expected payload, treating as decode failure");
            &[][..]
        };

        TransportBlockDecodeResult {
            payload: pack_bits(payload_bits),
            crc_ok: crc_ok && payload_bits.len() == payload_bits_len,
            cb_iterations,
        }
    }

    /// Extract the data REs written by `map_to_resource_grid`, in the same
    /// iteration order, so RX and TX can never disagree on RE ordering.
    fn extract_pdsch_res(
        &self,
        resource_grid: &super::resource_grid::ResourceGrid,
        config: &PdschConfig,
    ) -> Vec<Complex32> {
        let mut symbols = Vec::new();

        for ofdm_symbol in config.start_symbol..config.start_symbol + config.num_symbols {
            if self.is_dmrs_symbol(ofdm_symbol, config) {
                continue;
            }

            for prb in &config.prb_allocation {
                for subcarrier in 0..12 {
                    let re_idx = *prb as usize * 12 + subcarrier;
                    symbols.push(resource_grid.get_re(re_idx as u16, ofdm_symbol).unwrap_or(Complex32::new(0.0, 0.0)));
                }
            }
        }

        symbols
    }

    /// Zero-forcing per-RE equalization: divide the received sample by the
    /// channel estimate at that RE. A near-zero estimate is treated as an
    /// erasure (equalized to 0, which demaps to a 0 LLR on every bit).
    fn equalize(&self, rx: &[Complex32], channel_estimate: &[Complex32]) -> Vec<Complex32> {
        const MIN_CHANNEL_MAGNITUDE: f32 = 1.0e-6;
        rx.iter()
            .zip(channel_estimate.iter())
            .map(|(&r, &h)| if h.norm() > MIN_CHANNEL_MAGNITUDE { r / h } else { Complex32::new(0.0, 0.0) })
            .collect()
    }

    /// Max-log soft demapper: for every bit position, the LLR is the gap
    /// between the nearest constellation point with that bit 0 and the
    /// nearest with that bit 1, scaled by noise variance. Positive favors
    /// bit 0, matching this crate's decoder convention. The constellation
    /// is enumerated from the same `modulate_*` functions used for TX so
    /// the two can never drift apart.
    fn demap_bits(&self, symbols: &[Complex32], modulation: ModulationScheme, noise_variance: f32) -> Vec<f32> {
        let bits_per_symbol = self.get_bits_per_symbol(modulation);
        let num_points = 1usize << bits_per_symbol;
        let constellation: Vec<Complex32> = (0..num_points)
            .map(|packed| match modulation {
                ModulationScheme::Qpsk => self.modulate_qpsk(packed as u8),
                ModulationScheme::Qam16 => self.modulate_16qam(packed as u8),
                ModulationScheme::Qam64 => self.modulate_64qam(packed as u8),
                ModulationScheme::Qam256 => self.modulate_256qam(packed as u8),
            })
            .collect();

        let noise_variance = noise_variance.max(1.0e-6);
        let mut llrs = Vec::with_capacity(symbols.len() * bits_per_symbol);
        for &rx in symbols {
            for chunk_bit_pos in 0..bits_per_symbol {
                // `modulate_bits` builds `packed` MSB-first from the chunk
                // (first bit in the chunk becomes the most significant bit
                // of `packed`), so invert the position here.
                let packed_bit_index = bits_per_symbol - 1 - chunk_bit_pos;
                let mut min0 = f32::INFINITY;
                let mut min1 = f32::INFINITY;
                for (packed, &point) in constellation.iter().enumerate() {
                    let dist = (rx - point).norm_sqr();
                    if (packed >> packed_bit_index) & 1 == 0 {
                        min0 = min0.min(dist);
                    } else {
                        min1 = min1.min(dist);
                    }
                }
                llrs.push((min1 - min0) / noise_variance);
            }
        }
        llrs
    }

    /// Descramble LLRs with the same sequence `scramble_bits` applies:
    /// negate the LLR wherever the scrambling bit is 1 (undoing the XOR in
    /// the soft domain), leave it unchanged where it is 0.
    fn descramble_llrs(&self, llrs: &[f32], config: &PdschConfig) -> Vec<f32> {
        let c_init = self.calculate_scrambling_cinit(config);
        let mut generator = DmrsSequenceGenerator::new(c_init);

        llrs.iter()
            .map(|&llr| if generator.next_bit() == 1 { -llr } else { llr })
            .collect()
    }

    fn calculate_available_res(&self, config: &PdschConfig) -> usize {
        let res_per_prb_per_symbol = 12;
        let mut total_res = 0;

        for symbol in config.start_symbol..config.start_symbol + config.num_symbols {
            if !self.is_dmrs_symbol(symbol, config) {
                total_res += config.prb_allocation.len() * res_per_prb_per_symbol;
            } else {
                total_res += config.prb_allocation.len() * res_per_prb_per_symbol / 2;
            }
        }

        total_res
    }

    fn is_dmrs_symbol(&self, symbol: u8, config: &PdschConfig) -> bool {
        symbol == config.start_symbol
    }

    fn get_bits_per_symbol(&self, modulation: ModulationScheme) -> usize {
        modulation.bits_per_symbol()
    }

    fn calculate_scrambling_cinit(&self, config: &PdschConfig) -> u32 {
        let q = 0;
        let c_init = (config.rnti as u32) * (1 << 15) + (q << 14) + config.n_id as u32;
        c_init & 0x7FFFFFFF
    }

    fn modulate_qpsk(&self, bits: u8) -> num_complex::Complex32 {
        let b0 = bits & 1;
        let b1 = (bits >> 1) & 1;

        let scale = 1.0 / std::f32::consts::SQRT_2;
        num_complex::Complex32::new(
            scale * (1.0 - 2.0 * b0 as f32),
            scale * (1.0 - 2.0 * b1 as f32),
        )
    }

    fn modulate_16qam(&self, bits: u8) -> num_complex::Complex32 {
        let b0 = bits & 1;
        let b1 = (bits >> 1) & 1;
        let b2 = (bits >> 2) & 1;
        let b3 = (bits >> 3) & 1;

        let scale = 1.0 / 10.0_f32.sqrt();
        let i = (1.0 - 2.0 * b0 as f32) * (2.0 - (1.0 - 2.0 * b2 as f32));
        let q = (1.0 - 2.0 * b1 as f32) * (2.0 - (1.0 - 2.0 * b3 as f32));

        num_complex::Complex32::new(scale * i, scale * q)
    }

    fn modulate_64qam(&self, bits: u8) -> num_complex::Complex32 {
        let scale = 1.0 / 42.0_f32.sqrt();
        let i_bits = bits & 0x7;
        let q_bits = (bits >> 3) & 0x7;

        let i = [-7.0, -5.0, -3.0, -1.0, 1.0, 3.0, 5.0, 7.0][i_bits as usize];
        let q = [-7.0, -5.0, -3.0, -1.0, 1.0, 3.0, 5.0, 7.0][q_bits as usize];

        num_complex::Complex32::new(scale * i, scale * q)
    }

    fn modulate_256qam(&self, bits: u8) -> num_complex::Complex32 {
        let scale = 1.0 / 170.0_f32.sqrt();
        let i_bits = bits & 0xF;
        let q_bits = (bits >> 4) & 0xF;

        let i = -15.0 + 2.0 * i_bits as f32;
        let q = -15.0 + 2.0 * q_bits as f32;

        num_complex::Complex32::new(scale * i, scale * q)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::resource_grid::ResourceGrid;
    use common::types::{Bandwidth, SubcarrierSpacing};

    fn test_config() -> PdschConfig {
        PdschConfig {
            tbs_bytes: 20,
            modulation: ModulationScheme::Qpsk,
            num_layers: 1,
            rv: 0,
            ldpc_base_graph: 2,
            ndi: true,
            harq_id: 0,
            prb_allocation: vec![0, 1, 2, 3],
            start_symbol: 0,
            num_symbols: 10,
            dmrs_type: 1,
            dmrs_additional_pos: 0,
            dmrs_config_type: 1,
            n_id: 1,
            rnti: 0x4601,
            code_block_size: 0,
        }
    }

    #[test]
    fn pdsch_tx_rx_round_trip_recovers_payload() {
        let cell = Arc::new(CellConfig { pci: 1, cell_id: 1, num_rb: 106 });
        let processor = PdschProcessor::new(cell);
        let config = test_config();
        let payload: Vec<u8> = (0..config.tbs_bytes as u8).collect();

        let mut grid =
            ResourceGrid::new(2048, 14, Bandwidth::Bw20, SubcarrierSpacing::Scs15).unwrap();
        processor.process_sib1_pdsch(&mut grid, &payload, &config).unwrap();

        let rx_symbol_count = processor.extract_pdsch_res(&grid, &config).len();
        let channel_estimate = vec![Complex32::new(1.0, 0.0); rx_symbol_count];
        let mut harq_buffers = Vec::new();
        let result = processor.decode_pdsch(&grid, &channel_estimate, 0.2, &config, &mut harq_buffers);

        assert!(result.crc_ok, "transport block should decode cleanly over an ideal channel");
        assert_eq!(result.payload, payload);
    }

    #[test]
    fn layer_mapping_rejects_multi_layer_configs() {
        let cell = Arc::new(CellConfig { pci: 1, cell_id: 1, num_rb: 106 });
        let processor = PdschProcessor::new(cell);
        let symbols = vec![Complex32::new(1.0, 0.0); 8];
        assert!(processor.layer_mapping(&symbols, 2).is_err());
        assert_eq!(processor.layer_mapping(&symbols, 1).unwrap().len(), 1);
    }

    #[test]
    fn segment_single_block_keeps_tb_whole() {
        let cell = Arc::new(CellConfig { pci: 1, cell_id: 1, num_rb: 106 });
        let processor = PdschProcessor::new(cell);
        let bits = vec![true; 1000];
        let (blocks, size) = processor.segment_transport_block(&bits, 1);
        assert_eq!(blocks.len(), 1);
        assert_eq!(size, 1000);
    }

    #[test]
    fn segment_splits_large_block_into_multiple_cbs() {
        let cell = Arc::new(CellConfig { pci: 1, cell_id: 1, num_rb: 106 });
        let processor = PdschProcessor::new(cell);
        let bits = vec![true; 20000];
        let (blocks, _) = processor.segment_transport_block(&bits, 1);
        assert!(blocks.len() > 1);
    }
}
