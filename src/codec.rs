//! Opinionated BLE codec
//!
//! Assumes little endian for all types

pub trait FixedSize: Sized {
    const SIZE: usize;
}

pub trait Type: Sized {
    fn size(&self) -> usize;
}

pub trait Decode<'d>: Type {
    fn decode(src: &'d [u8]) -> Result<Self, Error>;
}

impl<T: FixedSize> Type for T {
    fn size(&self) -> usize {
        Self::SIZE
    }
}

impl FixedSize for u8 {
    const SIZE: usize = 1;
}

impl Decode<'_> for u8 {
    fn decode(src: &[u8]) -> Result<Self, Error> {
        src.first().copied().ok_or(Error::InsufficientSpace)
    }
}

impl FixedSize for u16 {
    const SIZE: usize = 2;
}

impl Decode<'_> for u16 {
    fn decode(src: &[u8]) -> Result<Self, Error> {
        if src.len() < Self::SIZE {
            return Err(Error::InsufficientSpace);
        }
        Ok(u16::from_le_bytes([src[0], src[1]]))
    }
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Error {
    InsufficientSpace,
    InvalidValue,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_short_input() {
        assert_eq!(u8::decode(&[]), Err(Error::InsufficientSpace));
        assert_eq!(u16::decode(&[0x01]), Err(Error::InsufficientSpace));
        assert_eq!(u16::decode(&[0x34, 0x12, 0xff]), Ok(0x1234));
    }
}
