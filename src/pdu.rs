//! Advertising channel PDU layouts consumed when following an auxiliary pointer.
//!
//! Only the parts of an `ADV_EXT_IND` needed to reach the AuxPtr field are decoded. The fields
//! of the extended header appear in a fixed order, each one present only when its flag is set:
//!
//! ```text
//! | AdvA (6) | TargetA (6) | CTEInfo (1) | ADI (2) | AuxPtr (3) | SyncInfo (18) | TxPower (1) | ACAD |
//! ```
use bt_hci::param::BdAddr;
use bt_hci::FromHciBytes;

use crate::codec::{self, Decode, FixedSize};
use crate::cursor::ReadCursor;
use crate::phy::Phy;
use crate::Error;

pub const PDU_ADV_TYPE_EXT_IND: u8 = 0x07;

pub const BDADDR_SIZE: usize = 6;

/// Highest channel index an auxiliary packet may be sent on.
pub const MAX_CHAN_IDX: u8 = 39;

/// Advertising channel PDU header.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PduAdvHeader {
    pub kind: u8,
    pub chan_sel: bool,
    pub tx_addr: bool,
    pub rx_addr: bool,
    pub len: u8,
}

impl FixedSize for PduAdvHeader {
    const SIZE: usize = 2;
}

impl Decode<'_> for PduAdvHeader {
    fn decode(src: &[u8]) -> Result<Self, codec::Error> {
        if src.len() < Self::SIZE {
            return Err(codec::Error::InsufficientSpace);
        }
        Ok(Self {
            kind: src[0] & 0x0f,
            chan_sel: src[0] & 0x20 != 0,
            tx_addr: src[0] & 0x40 != 0,
            rx_addr: src[0] & 0x80 != 0,
            len: src[1],
        })
    }
}

/// Presence flags of the extended header fields.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExtHdrFlags(u8);

impl ExtHdrFlags {
    const ADV_ADDR: u8 = 1 << 0;
    const TGT_ADDR: u8 = 1 << 1;
    const CTE_INFO: u8 = 1 << 2;
    const ADI: u8 = 1 << 3;
    const AUX_PTR: u8 = 1 << 4;

    pub fn adv_addr(&self) -> bool {
        self.0 & Self::ADV_ADDR != 0
    }

    pub fn tgt_addr(&self) -> bool {
        self.0 & Self::TGT_ADDR != 0
    }

    pub fn cte_info(&self) -> bool {
        self.0 & Self::CTE_INFO != 0
    }

    pub fn adi(&self) -> bool {
        self.0 & Self::ADI != 0
    }

    pub fn aux_ptr(&self) -> bool {
        self.0 & Self::AUX_PTR != 0
    }
}

impl FixedSize for ExtHdrFlags {
    const SIZE: usize = 1;
}

impl Decode<'_> for ExtHdrFlags {
    fn decode(src: &[u8]) -> Result<Self, codec::Error> {
        u8::decode(src).map(Self)
    }
}

/// Advertising data info.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Adi {
    pub did: u16,
    pub sid: u8,
}

impl FixedSize for Adi {
    const SIZE: usize = 2;
}

impl Decode<'_> for Adi {
    fn decode(src: &[u8]) -> Result<Self, codec::Error> {
        let raw = u16::decode(src)?;
        Ok(Self {
            did: raw & 0x0fff,
            sid: (raw >> 12) as u8,
        })
    }
}

/// Sleep clock accuracy of the advertiser, as signalled in the auxiliary pointer.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClockAccuracy {
    Ppm51To500,
    Ppm0To50,
}

/// Units of the auxiliary pointer offset.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OffsetUnits {
    Us30,
    Us300,
}

impl OffsetUnits {
    pub fn us(self) -> u32 {
        match self {
            OffsetUnits::Us30 => 30,
            OffsetUnits::Us300 => 300,
        }
    }
}

/// Auxiliary pointer: where and when the next packet of the chain is sent.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AuxPtr {
    pub chan_idx: u8,
    pub ca: ClockAccuracy,
    pub offs_units: OffsetUnits,
    /// Offset in [`OffsetUnits`], 13 bits.
    pub offs: u16,
    pub phy: Phy,
}

impl AuxPtr {
    /// Offset from the start of the packet holding this pointer, in microseconds.
    pub fn offset_us(&self) -> u32 {
        self.offs as u32 * self.offs_units.us()
    }
}

impl FixedSize for AuxPtr {
    const SIZE: usize = 3;
}

impl Decode<'_> for AuxPtr {
    fn decode(src: &[u8]) -> Result<Self, codec::Error> {
        if src.len() < Self::SIZE {
            return Err(codec::Error::InsufficientSpace);
        }
        let chan_idx = src[0] & 0x3f;
        if chan_idx > MAX_CHAN_IDX {
            return Err(codec::Error::InvalidValue);
        }
        let raw = u16::from_le_bytes([src[1], src[2]]);
        let phy = Phy::from_aux_ptr((raw >> 13) as u8).map_err(|_| codec::Error::InvalidValue)?;
        Ok(Self {
            chan_idx,
            ca: if src[0] & 0x40 != 0 {
                ClockAccuracy::Ppm0To50
            } else {
                ClockAccuracy::Ppm51To500
            },
            offs_units: if src[0] & 0x80 != 0 {
                OffsetUnits::Us300
            } else {
                OffsetUnits::Us30
            },
            offs: raw & 0x1fff,
            phy,
        })
    }
}

/// The extended header fields of an `ADV_EXT_IND` up to and including its auxiliary pointer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExtAdvHeader {
    /// Payload length of the PDU holding this header.
    pub pdu_len: u8,
    pub adv_mode: u8,
    pub adv_addr: Option<BdAddr>,
    pub tgt_addr: Option<BdAddr>,
    pub adi: Option<Adi>,
    pub aux_ptr: AuxPtr,
}

impl ExtAdvHeader {
    /// Walk the extended header of a received advertising PDU to its auxiliary pointer.
    ///
    /// Returns [`Error::NotExtended`] for anything other than an `ADV_EXT_IND` with a non-empty
    /// extended header and [`Error::NoAuxPtr`] when the pointer is absent.
    pub fn locate(pdu: &[u8]) -> Result<Self, Error> {
        let mut cursor = ReadCursor::new(pdu);
        let header: PduAdvHeader = cursor.read()?;
        if header.kind != PDU_ADV_TYPE_EXT_IND || header.len == 0 {
            return Err(Error::NotExtended);
        }

        let mut payload = ReadCursor::new(cursor.slice(header.len as usize)?);
        let common: u8 = payload.read()?;
        let ext_hdr_len = (common & 0x3f) as usize;
        if ext_hdr_len == 0 {
            return Err(Error::NotExtended);
        }

        let mut ext = ReadCursor::new(payload.slice(ext_hdr_len)?);
        let flags: ExtHdrFlags = ext.read()?;
        if !flags.aux_ptr() {
            return Err(Error::NoAuxPtr);
        }
        // Not permitted on the primary channel.
        if flags.cte_info() {
            return Err(Error::InvalidValue);
        }

        let adv_addr = if flags.adv_addr() {
            Some(read_addr(&mut ext)?)
        } else {
            None
        };
        let tgt_addr = if flags.tgt_addr() {
            Some(read_addr(&mut ext)?)
        } else {
            None
        };
        let adi = if flags.adi() { Some(ext.read::<Adi>()?) } else { None };
        let aux_ptr: AuxPtr = ext.read()?;

        Ok(Self {
            pdu_len: header.len,
            adv_mode: common >> 6,
            adv_addr,
            tgt_addr,
            adi,
            aux_ptr,
        })
    }
}

fn read_addr(cursor: &mut ReadCursor<'_>) -> Result<BdAddr, Error> {
    let (addr, _) = BdAddr::from_hci_bytes(cursor.slice(BDADDR_SIZE)?)?;
    Ok(addr)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADV_ADDR: [u8; 6] = [0x11, 0x22, 0x33, 0x44, 0x55, 0x66];
    const TGT_ADDR: [u8; 6] = [0xa1, 0xa2, 0xa3, 0xa4, 0xa5, 0xa6];

    fn ext_ind(flags: u8, fields: &[u8]) -> std::vec::Vec<u8> {
        let ext_hdr_len = 1 + fields.len() as u8;
        let mut pdu = std::vec![PDU_ADV_TYPE_EXT_IND, 1 + ext_hdr_len, ext_hdr_len];
        pdu.push(flags);
        pdu.extend_from_slice(fields);
        pdu
    }

    #[test]
    fn aux_ptr_fields() {
        // chan 12, ca 0-50 ppm, 300 us units, offset 0x0123, PHY 2M
        let raw = [0x0c | 0x40 | 0x80, 0x23, 0x01 | (1 << 5)];
        let ptr = AuxPtr::decode(&raw).unwrap();
        assert_eq!(ptr.chan_idx, 12);
        assert_eq!(ptr.ca, ClockAccuracy::Ppm0To50);
        assert_eq!(ptr.offs_units, OffsetUnits::Us300);
        assert_eq!(ptr.offs, 0x0123);
        assert_eq!(ptr.phy, Phy::Le2M);
        assert_eq!(ptr.offset_us(), 0x0123 * 300);
    }

    #[test]
    fn aux_ptr_reserved_values() {
        assert_eq!(AuxPtr::decode(&[40, 0, 0]), Err(codec::Error::InvalidValue));
        assert_eq!(AuxPtr::decode(&[1, 0, 3 << 5]), Err(codec::Error::InvalidValue));
        assert_eq!(AuxPtr::decode(&[1, 0]), Err(codec::Error::InsufficientSpace));
    }

    #[test]
    fn offset_scaling_is_exact() {
        for offs in [0u16, 1, 100, 4095, 0x1fff] {
            let raw = offs.to_le_bytes();
            let fine = AuxPtr::decode(&[3, raw[0], raw[1]]).unwrap();
            let coarse = AuxPtr::decode(&[3 | 0x80, raw[0], raw[1]]).unwrap();
            assert_eq!(fine.offset_us(), offs as u32 * 30);
            assert_eq!(coarse.offset_us(), offs as u32 * 300);
        }
    }

    #[test]
    fn locate_with_all_preceding_fields() {
        let mut fields = std::vec::Vec::new();
        fields.extend_from_slice(&ADV_ADDR);
        fields.extend_from_slice(&TGT_ADDR);
        fields.extend_from_slice(&[0x34, 0x52]);
        fields.extend_from_slice(&[5, 100, 0]);
        let pdu = ext_ind(0x01 | 0x02 | 0x08 | 0x10, &fields);

        let hdr = ExtAdvHeader::locate(&pdu).unwrap();
        assert_eq!(hdr.adv_addr, Some(BdAddr::new(ADV_ADDR)));
        assert_eq!(hdr.tgt_addr, Some(BdAddr::new(TGT_ADDR)));
        assert_eq!(hdr.adi, Some(Adi { did: 0x234, sid: 5 }));
        assert_eq!(hdr.aux_ptr.chan_idx, 5);
        assert_eq!(hdr.aux_ptr.offs, 100);
        assert_eq!(hdr.aux_ptr.phy, Phy::Le1M);
        assert_eq!(hdr.pdu_len as usize, pdu.len() - 2);
    }

    #[test]
    fn locate_skips_only_present_fields() {
        let mut fields = std::vec::Vec::new();
        fields.extend_from_slice(&ADV_ADDR);
        fields.extend_from_slice(&[7, 10, 2 << 5]);
        let pdu = ext_ind(0x01 | 0x10, &fields);

        let hdr = ExtAdvHeader::locate(&pdu).unwrap();
        assert_eq!(hdr.tgt_addr, None);
        assert_eq!(hdr.adi, None);
        assert_eq!(hdr.aux_ptr.chan_idx, 7);
        assert_eq!(hdr.aux_ptr.phy, Phy::LeCoded);
    }

    #[test]
    fn locate_without_pointer() {
        let pdu = ext_ind(0x01, &ADV_ADDR);
        assert_eq!(ExtAdvHeader::locate(&pdu), Err(Error::NoAuxPtr));
    }

    #[test]
    fn locate_rejects_other_records() {
        // ADV_IND
        assert_eq!(ExtAdvHeader::locate(&[0x00, 6, 1, 2, 3, 4, 5, 6]), Err(Error::NotExtended));
        // Zero length
        assert_eq!(ExtAdvHeader::locate(&[PDU_ADV_TYPE_EXT_IND, 0]), Err(Error::NotExtended));
        // No extended header
        assert_eq!(
            ExtAdvHeader::locate(&[PDU_ADV_TYPE_EXT_IND, 3, 0x00, 0xaa, 0xbb]),
            Err(Error::NotExtended)
        );
    }

    #[test]
    fn locate_truncated_header() {
        // Flags claim an AdvA and an AuxPtr, but the header stops inside the address.
        let pdu = [PDU_ADV_TYPE_EXT_IND, 5, 4, 0x11, 0x01, 0x02, 0x03];
        assert_eq!(
            ExtAdvHeader::locate(&pdu),
            Err(Error::Codec(codec::Error::InsufficientSpace))
        );
        // Length byte runs past the received bytes.
        let pdu = [PDU_ADV_TYPE_EXT_IND, 20, 4, 0x10, 1, 2, 3];
        assert!(ExtAdvHeader::locate(&pdu).is_err());
    }

    #[test]
    fn locate_rejects_cte_info() {
        let pdu = ext_ind(0x04 | 0x10, &[0x00, 1, 2, 3]);
        assert_eq!(ExtAdvHeader::locate(&pdu), Err(Error::InvalidValue));
    }
}
