//! The draw-done handshake between the producer thread and the PE finish interrupt.
//!
//! A cycle goes `Idle -> Armed -> Signaled`, and the next [`Completion::arm`] starts a new one.
//! Holding the state lock stands for running with interrupts masked: the interrupt handler
//! cannot observe or change the state while the producer holds it.
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use tracing::{trace, warn};

use crate::hw::PixelEngine;
use crate::pipe::Pipe;
use crate::reg::bp;

/// Phase of a completion cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// No cycle was ever started.
    #[default]
    Idle,
    /// The GPU was asked to signal and has not done so yet.
    Armed,
    /// The GPU signaled. Everything before the draw-done request has executed.
    Signaled,
}

#[derive(Debug, Default)]
struct State {
    phase: Phase,
    cycle: u64,
    signals: u64,
}

/// The process-wide completion flag and the threads parked on it.
#[derive(Debug, Default)]
pub struct Completion {
    state: Mutex<State>,
    finished: Condvar,
}

impl Completion {
    pub fn new() -> Self {
        Self::default()
    }

    /// Masks the interrupt for as long as the guard lives.
    fn mask(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts a completion cycle: clears the flag, then asks the GPU to signal once everything
    /// issued so far has executed.
    ///
    /// The flag is cleared and the request pushed out before the interrupt is unmasked, so a
    /// signal can never land between the clear and the request.
    pub fn arm<P: Pipe + ?Sized>(&self, pipe: &mut P) -> Pending<'_> {
        let mut state = self.mask();
        state.phase = Phase::Armed;
        state.cycle += 1;

        pipe.load_bp(bp::Reg::PixelDone, bp::DRAW_DONE);
        pipe.flush();

        trace!(cycle = state.cycle, "armed completion");
        Pending {
            completion: self,
            cycle: state.cycle,
        }
    }

    /// The finish interrupt handler: acknowledges the interrupt, sets the flag and wakes every
    /// waiter, in that order.
    pub fn signal<E: PixelEngine + ?Sized>(&self, pe: &mut E) {
        pe.acknowledge_finish();

        let mut state = self.mask();
        if state.phase != Phase::Armed {
            warn!(cycle = state.cycle, phase = ?state.phase, "finish interrupt outside of a cycle");
        }

        state.phase = Phase::Signaled;
        state.signals += 1;
        trace!(cycle = state.cycle, "signaled completion");
        drop(state);

        self.finished.notify_all();
    }

    /// Requests a draw-done signal and blocks until it arrives.
    pub fn wait_for_gpu<P: Pipe + ?Sized>(&self, pipe: &mut P) {
        self.arm(pipe).wait();
    }

    pub fn phase(&self) -> Phase {
        self.mask().phase
    }

    /// How many cycles were started so far.
    pub fn cycles(&self) -> u64 {
        self.mask().cycle
    }

    /// How many finish interrupts were handled so far.
    pub fn signals(&self) -> u64 {
        self.mask().signals
    }
}

/// An armed completion cycle.
#[must_use = "a cycle that is never waited on does not synchronize anything"]
#[derive(Debug)]
pub struct Pending<'a> {
    completion: &'a Completion,
    cycle: u64,
}

impl Pending<'_> {
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Whether the GPU already signaled this cycle.
    pub fn is_finished(&self) -> bool {
        let state = self.completion.mask();
        self.check(&state)
    }

    fn check(&self, state: &State) -> bool {
        assert_eq!(
            state.cycle, self.cycle,
            "completion cycle {} overlapped by cycle {}",
            self.cycle, state.cycle
        );

        state.phase == Phase::Signaled
    }

    /// Blocks until the GPU signals this cycle. There is no timeout: a GPU that never signals
    /// hangs the caller.
    pub fn wait(self) {
        let mut state = self.completion.mask();
        while !self.check(&state) {
            state = self
                .completion
                .finished
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }

        trace!(cycle = self.cycle, "completion wait returned");
    }
}
