//! Auxiliary scan scheduling for a BLE link layer.
//!
//! When a primary channel `ADV_EXT_IND` carries an auxiliary pointer, the continuation packet is
//! sent later on a secondary channel and possibly another PHY. This crate follows that pointer:
//! it takes a context out of a fixed pool, works out when to open the receive window, registers
//! a one-shot timeout with the link layer's ticker and hands the expiry over to the radio
//! context, returning the context to the pool once the event is done or the registration failed.
//!
//! The crate is runtime and hardware-agnostic. The ticker and the radio driver are supplied by the
//! integration through the [`ticker::Ticker`] and [`scan_aux::AuxRadio`] traits.

// We're `#[no_std]`, except when we're testing
#![cfg_attr(not(test), no_std)]

use bt_hci::FromHciBytesError;

mod fmt;

mod codec;
mod cursor;

pub mod config;
pub mod dispatch;
pub mod pdu;
pub mod phy;
pub mod pool;
pub mod scan_aux;
pub mod ticker;
pub mod timing;

pub use config::Config;
pub use phy::Phy;
pub use pool::AuxHandle;
pub use scan_aux::{AuxRadio, RxFooter, RxNode, ScanAux, ScanAuxResources};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Error {
    /// The record is not an extended advertising PDU with an extended header.
    NotExtended,
    /// The extended header carries no auxiliary pointer.
    NoAuxPtr,
    /// A field holds a reserved or out of range value.
    InvalidValue,
    /// The deferred job queue is full.
    Busy,
    Codec(codec::Error),
}

impl From<FromHciBytesError> for Error {
    fn from(error: FromHciBytesError) -> Self {
        match error {
            FromHciBytesError::InvalidSize => Self::Codec(codec::Error::InsufficientSpace),
            _ => Self::InvalidValue,
        }
    }
}

impl From<codec::Error> for Error {
    fn from(error: codec::Error) -> Self {
        match error {
            codec::Error::InvalidValue => Self::InvalidValue,
            e => Self::Codec(e),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Error::NotExtended => {
                defmt::write!(fmt, "NotExtended")
            }
            Error::NoAuxPtr => {
                defmt::write!(fmt, "NoAuxPtr")
            }
            Error::InvalidValue => {
                defmt::write!(fmt, "InvalidValue")
            }
            Error::Busy => {
                defmt::write!(fmt, "Busy")
            }
            Error::Codec(value) => {
                defmt::write!(fmt, "Codec({})", value)
            }
        }
    }
}
