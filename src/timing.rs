//! When and for how long to listen for an auxiliary packet.
//!
//! The auxiliary pointer gives the start of the next packet relative to the start of the packet
//! that carried it. The receive window is opened early enough for the event to be set up and the
//! radio to ramp up, and a slot long enough for the whole reception is reserved in the ticker.

use crate::config::{us, Config};
use crate::pdu::AuxPtr;
use crate::phy::Phy;
use crate::pool::EventTiming;
use crate::ticker::us_to_ticks;

/// Window widening applied to every auxiliary scan.
///
/// TODO: derive the widening from the advertiser clock accuracy (`AuxPtr::ca`) and the offset.
pub const WINDOW_WIDENING_US: u32 = 1000;

/// Input of the timing calculation, taken from the received primary packet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AuxTimingInput {
    pub aux_ptr: AuxPtr,
    /// PHY the primary packet was received on.
    pub primary_phy: Phy,
    /// Payload length of the primary packet.
    pub pdu_len: u8,
    /// End of the primary reception, in microseconds after the event anchor.
    pub radio_end_us: u32,
}

/// Result of the timing calculation.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AuxTiming {
    /// Time from the event anchor to the start of the auxiliary event.
    pub offset_us: u32,
    pub ticks_offset: u32,
    pub ready_delay_us: u32,
    pub timing: EventTiming,
    /// Lead time the ticker anchor is moved back by.
    pub ticks_slot_offset: u32,
    /// Lead time charged against the slot reservation.
    pub ticks_slot_overhead: u32,
    /// The overheads exceeded the offset and it was clamped to zero.
    pub saturated: bool,
}

impl AuxTiming {
    pub fn calculate(config: &Config, input: &AuxTimingInput) -> Self {
        let ready_delay_us = config.rx_ready_delay_us(input.aux_ptr.phy);

        // Start of the primary packet, then on to the start of the auxiliary one. The radio has
        // to be up and listening before the packet starts. Only the final sum is clamped.
        let air_time_us = input.primary_phy.air_time_us(input.pdu_len, 0);
        let offset = i64::from(input.radio_end_us) + i64::from(input.aux_ptr.offset_us())
            - i64::from(air_time_us)
            - i64::from(us(config.overhead_start))
            - i64::from(us(config.jitter))
            - i64::from(ready_delay_us);
        let saturated = offset < 0;
        let offset_us = u32::try_from(offset.max(0)).unwrap_or(u32::MAX);

        if saturated {
            warn!("[scan aux] offset overhead exceeds aux offset, scheduling at anchor");
        }

        let timing = EventTiming {
            // Not supported yet
            ticks_active_to_start: 0,
            ticks_xtal_to_start: us_to_ticks(us(config.overhead_xtal)),
            ticks_preempt_to_start: us_to_ticks(us(config.overhead_preempt_min)),
            ticks_slot: us_to_ticks(
                us(config.overhead_start)
                    .saturating_add(ready_delay_us)
                    .saturating_add(us(config.rx_budget))
                    .saturating_add(us(config.overhead_end)),
            ),
        };

        let ticks_slot_offset = timing.ticks_active_to_start.max(timing.ticks_xtal_to_start);
        let ticks_slot_overhead = if config.low_latency { ticks_slot_offset } else { 0 };

        Self {
            offset_us,
            ticks_offset: us_to_ticks(offset_us),
            ready_delay_us,
            timing,
            ticks_slot_offset,
            ticks_slot_overhead,
            saturated,
        }
    }

    /// Ticker anchor for an event anchored at `ticks_anchor`.
    pub fn ticks_anchor(&self, ticks_anchor: u32) -> u32 {
        ticks_anchor.wrapping_sub(self.ticks_slot_offset)
    }

    /// Slot to reserve in the ticker.
    pub fn ticks_slot(&self) -> u32 {
        self.timing.ticks_slot.saturating_add(self.ticks_slot_overhead)
    }

    /// Absolute tick the ticker is asked to expire at.
    pub fn ticks_at_start(&self, ticks_anchor: u32) -> u32 {
        self.ticks_anchor(ticks_anchor).wrapping_add(self.ticks_offset)
    }
}
