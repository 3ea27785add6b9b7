//! Deferred execution of jobs in another link layer context.
//!
//! Every job is its own descriptor carried by value through a bounded channel, so several
//! contexts can have work pending at the same time. The queue is sized to hold one job per
//! auxiliary context, which is the most that can be outstanding. A full queue is therefore a
//! configuration error and callers treat [`Error::Busy`] as fatal.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::channel::Channel;

use crate::pool::AuxHandle;
use crate::ticker::TickerUser;
use crate::Error;

/// Timing of the expiry that triggered a radio preparation.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrepareParam {
    pub ticks_at_expire: u32,
    pub remainder: u32,
    pub lazy: u16,
    pub handle: AuxHandle,
}

/// Work deferred to the radio context.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Job {
    /// Prepare the radio for an auxiliary scan event.
    Prepare(PrepareParam),
    /// Return a context whose ticker registration failed.
    Release(AuxHandle),
}

/// Queue of jobs to run in the `target` context.
pub struct Dispatcher<M: RawMutex, const N: usize> {
    target: TickerUser,
    queue: Channel<M, Job, N>,
}

impl<M: RawMutex, const N: usize> Dispatcher<M, N> {
    pub const fn new(target: TickerUser) -> Self {
        Self {
            target,
            queue: Channel::new(),
        }
    }

    pub fn target(&self) -> TickerUser {
        self.target
    }

    /// Queue `job` to run later in the target context.
    pub fn enqueue(&self, from: TickerUser, job: Job) -> Result<(), Error> {
        trace!("[dispatch] {:?} -> {:?}: {:?}", from, self.target, job);
        self.queue.try_send(job).map_err(|_| Error::Busy)
    }

    /// Next pending job, if any.
    pub fn try_next(&self) -> Option<Job> {
        self.queue.try_receive().ok()
    }

    /// Wait for the next job.
    pub async fn next(&self) -> Job {
        self.queue.receive().await
    }

    /// Drop every pending job.
    pub fn clear(&self) {
        while self.queue.try_receive().is_ok() {}
    }
}
