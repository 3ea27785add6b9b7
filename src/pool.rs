//! A pool of auxiliary scan contexts with O(1) acquire and release.
use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;
use heapless::Vec;

use crate::phy::Phy;

/// Stable index of a context in its pool.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuxHandle(u8);

impl AuxHandle {
    pub fn raw(&self) -> u8 {
        self.0
    }

    pub(crate) fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Count of radio preparations scheduled but not yet completed for a context.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RefCount(u8);

impl RefCount {
    /// Returns the new count, or `None` if the count would wrap.
    pub(crate) fn inc(&mut self) -> Option<u8> {
        self.0 = self.0.checked_add(1)?;
        Some(self.0)
    }

    pub(crate) fn dec(&mut self) -> u8 {
        self.0 = self.0.saturating_sub(1);
        self.0
    }

    pub fn get(&self) -> u8 {
        self.0
    }
}

/// What the radio needs to receive the auxiliary packet.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AuxRadioParams {
    /// Context owning these parameters.
    pub handle: AuxHandle,
    /// Identifier of the primary scan instance that received the pointer.
    pub scan: u8,
    pub chan: u8,
    pub phy: Phy,
    pub window_widening_us: u32,
}

/// Ticker lead times and slot reservation of an auxiliary scan event.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EventTiming {
    pub ticks_active_to_start: u32,
    pub ticks_xtal_to_start: u32,
    pub ticks_preempt_to_start: u32,
    pub ticks_slot: u32,
}

/// State of one auxiliary scan.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AuxScanContext {
    pub refs: RefCount,
    pub radio: AuxRadioParams,
    pub timing: EventTiming,
}

impl AuxScanContext {
    const fn new(handle: AuxHandle) -> Self {
        Self {
            refs: RefCount(0),
            radio: AuxRadioParams {
                handle,
                scan: 0,
                chan: 0,
                phy: Phy::Le1M,
                window_widening_us: 0,
            },
            timing: EventTiming {
                ticks_active_to_start: 0,
                ticks_xtal_to_start: 0,
                ticks_preempt_to_start: 0,
                ticks_slot: 0,
            },
        }
    }
}

struct Slot {
    ctx: AuxScanContext,
    in_use: bool,
}

struct State<const N: usize> {
    slots: [Slot; N],
    free: Vec<u8, N>,
}

impl<const N: usize> State<N> {
    fn new() -> Self {
        let mut state = Self {
            slots: core::array::from_fn(|idx| Slot {
                ctx: AuxScanContext::new(AuxHandle(idx as u8)),
                in_use: false,
            }),
            free: Vec::new(),
        };
        state.reset();
        state
    }

    fn reset(&mut self) {
        self.free.clear();
        // Lowest index on top of the stack.
        for idx in (0..N).rev() {
            self.slots[idx] = Slot {
                ctx: AuxScanContext::new(AuxHandle(idx as u8)),
                in_use: false,
            };
            unwrap!(self.free.push(idx as u8));
        }
    }

    fn acquire(&mut self) -> Option<AuxHandle> {
        let idx = self.free.pop()?;
        let handle = AuxHandle(idx);
        let slot = &mut self.slots[handle.index()];
        slot.ctx = AuxScanContext::new(handle);
        slot.in_use = true;
        Some(handle)
    }

    fn release(&mut self, handle: AuxHandle) {
        let slot = &mut self.slots[handle.index()];
        assert!(slot.in_use, "release of free aux context {}", handle.raw());
        slot.in_use = false;
        slot.ctx.refs = RefCount(0);
        unwrap!(self.free.push(handle.raw()));
    }

    fn slot_mut(&mut self, handle: AuxHandle) -> &mut AuxScanContext {
        let slot = &mut self.slots[handle.index()];
        assert!(slot.in_use, "access to free aux context {}", handle.raw());
        &mut slot.ctx
    }
}

/// A fixed pool of `N` auxiliary scan contexts.
///
/// Contexts are addressed by [`AuxHandle`]. All access goes through the pool's mutex, so with a
/// `CriticalSectionRawMutex` the pool may be shared between the ticker and radio interrupts.
/// Releasing a handle that is not acquired is a fatal error.
pub struct AuxPool<M: RawMutex, const N: usize> {
    state: Mutex<M, RefCell<State<N>>>,
}

impl<M: RawMutex, const N: usize> Default for AuxPool<M, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: RawMutex, const N: usize> AuxPool<M, N> {
    const _ASSERT: () = core::assert!(N <= u8::MAX as usize, "aux pool holds at most 255 contexts");

    /// Create a pool with every context free.
    pub fn new() -> Self {
        let _ = Self::_ASSERT;
        Self {
            state: Mutex::new(RefCell::new(State::new())),
        }
    }

    /// Free every context.
    pub fn reset(&self) {
        self.state.lock(|state| state.borrow_mut().reset());
    }

    /// Take a free context, or `None` if all are in use.
    pub fn acquire(&self) -> Option<AuxHandle> {
        let handle = self.state.lock(|state| state.borrow_mut().acquire());
        if let Some(handle) = handle {
            trace!("[scan aux] acquire {}", handle.raw());
        }
        handle
    }

    /// Return a context to the pool.
    pub fn release(&self, handle: AuxHandle) {
        trace!("[scan aux] release {}", handle.raw());
        self.state.lock(|state| state.borrow_mut().release(handle));
    }

    /// Run `f` on an acquired context.
    pub fn with<R>(&self, handle: AuxHandle, f: impl FnOnce(&mut AuxScanContext) -> R) -> R {
        self.state.lock(|state| f(state.borrow_mut().slot_mut(handle)))
    }

    /// Copy of an acquired context, `None` if the context is free.
    pub fn get(&self, handle: AuxHandle) -> Option<AuxScanContext> {
        self.state.lock(|state| {
            let state = state.borrow();
            let slot = state.slots.get(handle.index())?;
            slot.in_use.then_some(slot.ctx)
        })
    }

    /// Handle of the context owning `params`.
    pub fn handle_of(params: &AuxRadioParams) -> AuxHandle {
        params.handle
    }

    /// Number of free contexts.
    pub fn available(&self) -> usize {
        self.state.lock(|state| state.borrow().free.len())
    }

    pub fn capacity(&self) -> usize {
        N
    }
}
