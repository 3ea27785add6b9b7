//! LE physical layers.

use crate::Error;

/// A LE PHY, in its bit-coded form.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Phy {
    Le1M = 0x01,
    Le2M = 0x02,
    LeCoded = 0x04,
}

impl Phy {
    /// Decode the 3-bit PHY field of an auxiliary pointer.
    ///
    /// Codes above 2 are reserved.
    pub fn from_aux_ptr(code: u8) -> Result<Self, Error> {
        match code {
            0 => Ok(Phy::Le1M),
            1 => Ok(Phy::Le2M),
            2 => Ok(Phy::LeCoded),
            _ => Err(Error::InvalidValue),
        }
    }

    /// Index into per-PHY tables: 1M, 2M, Coded.
    pub(crate) fn index(self) -> usize {
        match self {
            Phy::Le1M => 0,
            Phy::Le2M => 1,
            Phy::LeCoded => 2,
        }
    }

    /// Time on air in microseconds of a PDU with `octets` payload bytes and `mic` bytes of MIC,
    /// from the start of the preamble to the end of the CRC.
    ///
    /// Coded PHY uses the S8 coding, the worst case for a receiver.
    pub fn air_time_us(self, octets: u8, mic: u8) -> u32 {
        let pdu = 2 + octets as u32 + mic as u32;
        match self {
            // preamble, access address, header, payload, CRC at 1 us per bit
            Phy::Le1M => (1 + 4 + pdu + 3) * 8,
            // 2 octet preamble at 0.5 us per bit
            Phy::Le2M => (2 + 4 + pdu + 3) * 8 / 2,
            // preamble, access address, CI and TERM1 are always S8, then PDU, CRC and TERM2
            Phy::LeCoded => 80 + 256 + 16 + 24 + ((pdu * 8) + 24 + 3) * 8,
        }
    }
}
