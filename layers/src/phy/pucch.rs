//! PUCCH format selection and resource-index derivation (LTE-style
//! formats 1/1a/1b/2/2a/2b).
//!
//! New module, grounded on the format-selection rule and resource-index
//! derivation described alongside `pdcch.rs`'s CCE allocation; the UCI
//! payload shapes carried per format follow `uci.rs`.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PucchFormat {
    /// Scheduling request only, no UCI payload.
    Format1,
    /// Single-bit HARQ-ACK.
    Format1a,
    /// Two-bit HARQ-ACK.
    Format1b,
    /// CQI report only.
    Format2,
    /// CQI report plus a single HARQ-ACK bit.
    Format2a,
    /// CQI report plus two HARQ-ACK bits.
    Format2b,
}

/// UCI payload shape a caller wants to carry on PUCCH.
#[derive(Debug, Clone, Copy, Default)]
pub struct PucchPayloadShape {
    pub ack_bits: u8,
    pub has_cqi: bool,
    pub is_scheduling_request: bool,
}

/// Select the PUCCH format per the LTE rule: 1-bit ACK -> 1a, 2-bit ACK ->
/// 1b, CQI-only -> 2, CQI + 1-bit ACK -> 2a, CQI + 2-bit ACK -> 2b;
/// scheduling-request uses format 1.
pub fn select_format(shape: PucchPayloadShape) -> PucchFormat {
    if shape.is_scheduling_request && shape.ack_bits == 0 && !shape.has_cqi {
        return PucchFormat::Format1;
    }
    match (shape.has_cqi, shape.ack_bits) {
        (true, 0) => PucchFormat::Format2,
        (true, 1) => PucchFormat::Format2a,
        (true, _) => PucchFormat::Format2b,
        (false, 1) => PucchFormat::Format1a,
        (false, _) => PucchFormat::Format1b,
    }
}

/// Source of a PUCCH resource index: either derived from the DCI CCE
/// that granted the downlink assignment (dynamic ACK/NACK resource) or a
/// higher-layer-configured scheduling-request index.
#[derive(Debug, Clone, Copy)]
pub enum ResourceSource {
    DciCce { first_cce: u16, n1_pucch_offset: u16 },
    SchedulingRequest { sr_index: u16 },
}

/// Derive the PUCCH resource index: `n1_pucch_offset + first_cce` for
/// dynamically-granted ACK/NACK resources, or the configured SR index
/// directly for scheduling requests.
pub fn resource_index(source: ResourceSource) -> u16 {
    match source {
        ResourceSource::DciCce { first_cce, n1_pucch_offset } => n1_pucch_offset + first_cce,
        ResourceSource::SchedulingRequest { sr_index } => sr_index,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_ack_bit_selects_format_1a() {
        let shape = PucchPayloadShape { ack_bits: 1, has_cqi: false, is_scheduling_request: false };
        assert_eq!(select_format(shape), PucchFormat::Format1a);
    }

    #[test]
    fn two_ack_bits_selects_format_1b() {
        let shape = PucchPayloadShape { ack_bits: 2, has_cqi: false, is_scheduling_request: false };
        assert_eq!(select_format(shape), PucchFormat::Format1b);
    }

    #[test]
    fn cqi_with_two_ack_bits_selects_format_2b() {
        let shape = PucchPayloadShape { ack_bits: 2, has_cqi: true, is_scheduling_request: false };
        assert_eq!(select_format(shape), PucchFormat::Format2b);
    }

    #[test]
    fn scheduling_request_alone_selects_format_1() {
        let shape = PucchPayloadShape { ack_bits: 0, has_cqi: false, is_scheduling_request: true };
        assert_eq!(select_format(shape), PucchFormat::Format1);
    }

    #[test]
    fn resource_index_from_cce_adds_offset() {
        let idx = resource_index(ResourceSource::DciCce { first_cce: 3, n1_pucch_offset: 100 });
        assert_eq!(idx, 103);
    }

    #[test]
    fn resource_index_from_sr_is_passthrough() {
        let idx = resource_index(ResourceSource::SchedulingRequest { sr_index: 42 });
        assert_eq!(idx, 42);
    }
}
