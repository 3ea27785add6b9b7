//! Scheduling configuration.
//!
//! The auxiliary scan needs to know how long the radio and the event pipeline take to get going
//! on the target, how the ticker is set up, and whether slot lead times are accounted for in
//! low latency mode. These are collected in [`Config`].
//!
//! [`Config::DEFAULT`] holds values for nRF52 class radios. The `low-latency` Cargo feature sets
//! the default of [`Config::low_latency`].

use embassy_time::Duration;

use crate::phy::Phy;

/// Timing and ticker configuration for auxiliary scanning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Config {
    /// Time from the start of an event until the radio can be set up.
    ///
    /// Default: 200 us.
    pub overhead_start: Duration,

    /// Margin for jitter in the scheduling of events.
    ///
    /// Default: 16 us.
    pub jitter: Duration,

    /// Time needed to start the high frequency crystal before an event.
    ///
    /// Default: 1500 us.
    pub overhead_xtal: Duration,

    /// Minimum time needed to preempt an ongoing event.
    ///
    /// Default: 0 us.
    pub overhead_preempt_min: Duration,

    /// Time needed to close an event after the radio is done.
    ///
    /// Default: 40 us.
    pub overhead_end: Duration,

    /// Time reserved for receiving the auxiliary packet.
    ///
    /// Default: 10 ms.
    pub rx_budget: Duration,

    /// Radio receiver ready delay with a single antenna, per PHY (1M, 2M, Coded).
    ///
    /// Default: 140 us on every PHY.
    pub rx_ready_delay: [Duration; 3],

    /// Charge the slot lead time against the reserved ticker slot.
    ///
    /// Default: on when built with the `low-latency` feature.
    pub low_latency: bool,

    /// Ticker instance of the link layer.
    ///
    /// Default: 0.
    pub ticker_instance: u8,

    /// Ticker id of the first auxiliary scan context. Context `n` uses `ticker_id_base + n`.
    ///
    /// Default: 8.
    pub ticker_id_base: u8,
}

impl Config {
    pub const DEFAULT: Config = Config {
        overhead_start: Duration::from_micros(200),
        jitter: Duration::from_micros(16),
        overhead_xtal: Duration::from_micros(1500),
        overhead_preempt_min: Duration::from_micros(0),
        overhead_end: Duration::from_micros(40),
        rx_budget: Duration::from_micros(10_000),
        rx_ready_delay: [Duration::from_micros(140); 3],
        low_latency: cfg!(feature = "low-latency"),
        ticker_instance: 0,
        ticker_id_base: 8,
    };

    /// Radio receiver ready delay for `phy` in microseconds.
    pub fn rx_ready_delay_us(&self, phy: Phy) -> u32 {
        us(self.rx_ready_delay[phy.index()])
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Whole microseconds of a duration, saturating at `u32::MAX`.
pub(crate) fn us(duration: Duration) -> u32 {
    u32::try_from(duration.as_micros()).unwrap_or(u32::MAX)
}
