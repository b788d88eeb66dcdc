//! Adaptive Modulation and Coding table.
//!
//! Pure, stateless CQI → MCS mapping. A resource block is 12 subcarriers by
//! 7 OFDM symbols (normal cyclic prefix), i.e. 84 resource elements, so one
//! RB in one slot carries `floor(84 * modulation_order * code_rate)` bits.
//! A full-TTI RB pair carries twice that.

use crate::error::SimError;

/// Lowest valid CQI.
pub const MIN_CQI: u8 = 1;
/// Highest valid CQI.
pub const MAX_CQI: u8 = 15;

/// Resource elements per RB per slot: 12 subcarriers x 7 symbols (normal CP).
pub const RE_PER_RB: u32 = 84;

/// CQI 1..=15 → (modulation order, code rate). Rows 1-4 are QPSK, 5-7 16QAM,
/// 8-15 64QAM.
const CQI_TO_MCS: [(u32, f64); 15] = [
    (2, 0.152),
    (2, 0.234),
    (2, 0.377),
    (2, 0.601),
    (4, 0.369),
    (4, 0.479),
    (4, 0.601),
    (6, 0.455),
    (6, 0.554),
    (6, 0.650),
    (6, 0.754),
    (6, 0.852),
    (6, 0.926),
    (6, 0.953),
    (6, 0.978),
];

/// Modulation order and code rate for a CQI.
pub fn mcs(cqi: u8) -> Result<(u32, f64), SimError> {
    if !(MIN_CQI..=MAX_CQI).contains(&cqi) {
        return Err(SimError::InvalidCqi(cqi));
    }
    Ok(CQI_TO_MCS[(cqi - 1) as usize])
}

/// Bits carried by one RB in one slot at the given CQI.
pub fn bits_per_rb(cqi: u8) -> Result<u32, SimError> {
    let (modulation, code_rate) = mcs(cqi)?;
    Ok((RE_PER_RB as f64 * modulation as f64 * code_rate) as u32)
}

/// Bits carried by an RB pair spanning both slots of a TTI.
pub fn bits_per_rb_pair(cqi: u8) -> Result<u32, SimError> {
    Ok(2 * bits_per_rb(cqi)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_table_rows() {
        // floor(84 * 2 * 0.152) = 25
        assert_eq!(bits_per_rb(1).unwrap(), 25);
        // floor(84 * 6 * 0.650) = 327
        assert_eq!(bits_per_rb(10).unwrap(), 327);
        // floor(84 * 6 * 0.978) = 492
        assert_eq!(bits_per_rb(15).unwrap(), 492);
        assert_eq!(bits_per_rb_pair(15).unwrap(), 984);
    }

    #[test]
    fn monotone_in_cqi() {
        let mut prev = 0;
        for cqi in MIN_CQI..=MAX_CQI {
            let bits = bits_per_rb(cqi).unwrap();
            assert!(bits >= prev, "bits_per_rb must not decrease at CQI {cqi}");
            prev = bits;
        }
    }

    #[test]
    fn invalid_cqi_is_fatal() {
        assert_eq!(bits_per_rb(0), Err(SimError::InvalidCqi(0)));
        assert_eq!(bits_per_rb(16), Err(SimError::InvalidCqi(16)));
    }

    #[test]
    fn modulation_orders_follow_the_standard_bands() {
        for cqi in 1..=4 {
            assert_eq!(mcs(cqi).unwrap().0, 2);
        }
        for cqi in 5..=7 {
            assert_eq!(mcs(cqi).unwrap().0, 4);
        }
        for cqi in 8..=15 {
            assert_eq!(mcs(cqi).unwrap().0, 6);
        }
    }
}
