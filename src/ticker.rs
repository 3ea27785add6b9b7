//! Interface to the link layer ticker.
//!
//! The ticker is the hardware timer driven scheduler that starts radio events. It is provided by
//! the integration; this crate only registers one-shot timeouts with it and reacts to its
//! callbacks through [`TickerHandler`].

use crate::pool::AuxHandle;

pub const TICKER_NULL_PERIOD: u32 = 0;
pub const TICKER_NULL_REMAINDER: u32 = 0;
pub const TICKER_NULL_LAZY: u16 = 0;

/// Status of a ticker operation.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickerStatus {
    Success,
    Failure,
    /// Accepted, the outcome is reported later through [`TickerHandler::on_op_result`].
    Busy,
}

/// Execution contexts of the link layer, from the most to the least time critical.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TickerUser {
    /// Radio preparation and drive.
    Lll = 0,
    /// Ticker expiry callbacks.
    UllHigh = 1,
}

/// A ticker start request.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickerStart {
    pub instance: u8,
    pub user: TickerUser,
    pub ticker_id: u8,
    pub ticks_anchor: u32,
    pub ticks_first: u32,
    pub ticks_periodic: u32,
    pub remainder_periodic: u32,
    pub lazy: u16,
    pub ticks_slot: u32,
    /// Passed back to the [`TickerHandler`] callbacks.
    pub param: AuxHandle,
}

impl TickerStart {
    /// Absolute tick the first expiry is requested at.
    pub fn ticks_at_start(&self) -> u32 {
        self.ticks_anchor.wrapping_add(self.ticks_first)
    }
}

/// Timing of a ticker expiry.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Expiry {
    pub ticks_at_expire: u32,
    pub remainder: u32,
    pub lazy: u16,
}

/// The ticker driving radio events.
pub trait Ticker {
    /// Register a ticker node. Expiry and the final operation status are delivered to the
    /// [`TickerHandler`] the node's owner registered with the ticker.
    fn start(&self, start: TickerStart) -> TickerStatus;
}

/// Receiver of ticker callbacks.
pub trait TickerHandler {
    /// The ticker node expired. Called in the [`TickerUser::UllHigh`] context.
    fn on_expire(&self, param: AuxHandle, expiry: Expiry);

    /// Final status of a start operation.
    fn on_op_result(&self, param: AuxHandle, status: TickerStatus);
}

/// Convert microseconds to ticker ticks, truncating.
pub fn us_to_ticks(us: u32) -> u32 {
    (us as u64 * embassy_time::TICK_HZ / 1_000_000) as u32
}
