//! Auxiliary scan.
//!
//! Follows the auxiliary pointer of a received `ADV_EXT_IND` and schedules reception of the
//! packet it points to.
//!
//! A scheduled attempt goes through these steps:
//!
//! 1. [`ScanAux::setup`] locates the pointer, takes a context from the pool, computes the timing
//!    and starts a one-shot ticker node for the context.
//! 2. The ticker expires and calls [`TickerHandler::on_expire`]: the context reference count is
//!    raised and a prepare job is queued for the radio context.
//! 3. The radio context runs the job through [`ScanAux::run_pending`] or [`ScanAux::process`],
//!    which hands it to the [`AuxRadio`].
//! 4. When the event is over, [`ScanAux::done`] returns the context to the pool.
//!
//! If the ticker reports that the start did not succeed, [`TickerHandler::on_op_result`] queues a
//! release job for the radio context instead, and no expiry follows. Either way exactly one
//! release retires the attempt.
use embassy_futures::yield_now;
use embassy_sync::blocking_mutex::raw::RawMutex;

use crate::config::Config;
use crate::dispatch::{Dispatcher, Job, PrepareParam};
use crate::pdu::ExtAdvHeader;
use crate::phy::Phy;
use crate::pool::{AuxHandle, AuxPool, AuxRadioParams};
use crate::ticker::{
    Expiry, Ticker, TickerHandler, TickerStart, TickerStatus, TickerUser, TICKER_NULL_LAZY, TICKER_NULL_PERIOD,
    TICKER_NULL_REMAINDER,
};
use crate::timing::{AuxTiming, AuxTimingInput, WINDOW_WIDENING_US};
use crate::Error;

/// Reception details attached to a received PDU.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RxFooter {
    /// Identifier of the primary scan instance that received the PDU.
    pub param: u8,
    /// Ticker tick of the event anchor.
    pub ticks_anchor: u32,
    /// End of the reception, in microseconds after the event anchor.
    pub radio_end_us: u32,
}

/// A received advertising PDU.
#[derive(Debug, Clone, Copy)]
pub struct RxNode<'a> {
    /// PDU header and payload.
    pub pdu: &'a [u8],
    pub ftr: RxFooter,
}

/// The radio driver's side of an auxiliary scan.
pub trait AuxRadio {
    /// Prepare the radio to receive the auxiliary packet. Called in the [`TickerUser::Lll`]
    /// context, right after the ticker expiry.
    fn prepare(&mut self, param: &PrepareParam, radio: &AuxRadioParams);
}

/// Resources of the auxiliary scan: the context pool and the radio context job queue.
pub struct ScanAuxResources<M: RawMutex, const N: usize> {
    pool: AuxPool<M, N>,
    lll: Dispatcher<M, N>,
}

impl<M: RawMutex, const N: usize> Default for ScanAuxResources<M, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: RawMutex, const N: usize> ScanAuxResources<M, N> {
    /// Create resources for `N` concurrent auxiliary scans.
    pub fn new() -> Self {
        Self {
            pool: AuxPool::new(),
            lll: Dispatcher::new(TickerUser::Lll),
        }
    }
}

/// Schedules auxiliary scans with the ticker `T`.
pub struct ScanAux<'d, M: RawMutex, T, const N: usize> {
    config: Config,
    ticker: T,
    pool: &'d AuxPool<M, N>,
    lll: &'d Dispatcher<M, N>,
}

impl<'d, M: RawMutex, T: Ticker, const N: usize> ScanAux<'d, M, T, N> {
    /// Panics if the ticker ids of the `N` contexts do not fit above `config.ticker_id_base`.
    pub fn new(config: Config, ticker: T, resources: &'d ScanAuxResources<M, N>) -> Self {
        assert!(
            config.ticker_id_base as usize + N <= u8::MAX as usize + 1,
            "ticker ids {} + {} contexts out of range",
            config.ticker_id_base,
            N
        );
        Self {
            config,
            ticker,
            pool: &resources.pool,
            lll: &resources.lll,
        }
    }

    /// Free every context and drop pending jobs.
    pub fn init(&self) {
        self.reset();
    }

    /// Free every context and drop pending jobs.
    pub fn reset(&self) {
        self.lll.clear();
        self.pool.reset();
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn ticker(&self) -> &T {
        &self.ticker
    }

    pub fn pool(&self) -> &AuxPool<M, N> {
        self.pool
    }

    /// Schedule reception of the packet the auxiliary pointer in `rx` refers to.
    ///
    /// `phy` is the PHY `rx` was received on. When `aux` is given that context is reused,
    /// otherwise one is acquired from the pool.
    ///
    /// Returns the scheduled context, or `None` when there is nothing to follow or no free
    /// context. In the latter case the chain is not followed.
    pub fn setup(&self, rx: &RxNode<'_>, phy: Phy, aux: Option<AuxHandle>) -> Option<AuxHandle> {
        let hdr = match ExtAdvHeader::locate(rx.pdu) {
            Ok(hdr) => hdr,
            Err(Error::NotExtended | Error::NoAuxPtr) => return None,
            Err(e) => {
                debug!("[scan aux] malformed extended header: {:?}", e);
                return None;
            }
        };

        let handle = match aux {
            Some(handle) => handle,
            None => match self.pool.acquire() {
                Some(handle) => handle,
                None => {
                    debug!("[scan aux] no free context");
                    return None;
                }
            },
        };

        let timing = AuxTiming::calculate(
            &self.config,
            &AuxTimingInput {
                aux_ptr: hdr.aux_ptr,
                primary_phy: phy,
                pdu_len: hdr.pdu_len,
                radio_end_us: rx.ftr.radio_end_us,
            },
        );

        self.pool.with(handle, |ctx| {
            ctx.radio.scan = rx.ftr.param;
            ctx.radio.chan = hdr.aux_ptr.chan_idx;
            ctx.radio.phy = hdr.aux_ptr.phy;
            ctx.radio.window_widening_us = WINDOW_WIDENING_US;
            ctx.timing = timing.timing;
        });

        let start = TickerStart {
            instance: self.config.ticker_instance,
            user: TickerUser::UllHigh,
            ticker_id: self.config.ticker_id_base + handle.raw(),
            ticks_anchor: timing.ticks_anchor(rx.ftr.ticks_anchor),
            ticks_first: timing.ticks_offset,
            ticks_periodic: TICKER_NULL_PERIOD,
            remainder_periodic: TICKER_NULL_REMAINDER,
            lazy: TICKER_NULL_LAZY,
            ticks_slot: timing.ticks_slot(),
            param: handle,
        };
        trace!(
            "[scan aux] {} chan {} offset {} us",
            handle.raw(),
            hdr.aux_ptr.chan_idx,
            timing.offset_us
        );

        let status = self.ticker.start(start);
        assert!(
            status == TickerStatus::Success || status == TickerStatus::Busy,
            "ticker start failed: {:?}",
            status
        );
        Some(handle)
    }

    /// The event of `handle` is over, return its context to the pool.
    pub fn done(&self, handle: AuxHandle) {
        self.pool.with(handle, |ctx| ctx.refs.dec());
        self.pool.release(handle);
    }

    /// Pool handle of the context owning `radio`.
    pub fn lll_handle_get(&self, radio: &AuxRadioParams) -> u8 {
        AuxPool::<M, N>::handle_of(radio).raw()
    }

    /// Run a job in the radio context.
    pub fn execute(&self, job: Job, radio: &mut impl AuxRadio) {
        match job {
            Job::Prepare(param) => {
                let params = self.pool.with(param.handle, |ctx| ctx.radio);
                radio.prepare(&param, &params);
            }
            Job::Release(handle) => self.pool.release(handle),
        }
    }

    /// Run every pending radio context job. Returns the number of jobs run.
    ///
    /// Meant to be called from the radio context interrupt handler.
    pub fn run_pending(&self, radio: &mut impl AuxRadio) -> usize {
        let mut count = 0;
        while let Some(job) = self.lll.try_next() {
            self.execute(job, radio);
            count += 1;
        }
        count
    }

    /// Wait for the next radio context job and run it.
    pub async fn process(&self, radio: &mut impl AuxRadio) {
        let job = self.lll.next().await;
        self.execute(job, radio);
    }

    /// Run radio context jobs forever.
    pub async fn run(&self, radio: &mut impl AuxRadio) -> ! {
        loop {
            self.process(radio).await;
            yield_now().await;
        }
    }
}

impl<M: RawMutex, T: Ticker, const N: usize> TickerHandler for ScanAux<'_, M, T, N> {
    fn on_expire(&self, param: AuxHandle, expiry: Expiry) {
        let refs = self.pool.with(param, |ctx| ctx.refs.inc());
        unwrap!(refs, "aux context {} reference count overflow", param.raw());

        let job = Job::Prepare(PrepareParam {
            ticks_at_expire: expiry.ticks_at_expire,
            remainder: expiry.remainder,
            lazy: expiry.lazy,
            handle: param,
        });
        unwrap!(self.lll.enqueue(TickerUser::UllHigh, job));
    }

    fn on_op_result(&self, param: AuxHandle, status: TickerStatus) {
        if status == TickerStatus::Success {
            return;
        }

        warn!("[scan aux] ticker start of {} failed: {:?}", param.raw(), status);
        // Pool is only released from the radio context.
        unwrap!(self.lll.enqueue(TickerUser::UllHigh, Job::Release(param)));
    }
}
