use std::cell::RefCell;
use std::rc::Rc;

use smallvec::SmallVec;

use crate::error::Fault;
use crate::runtime::{Event, Probe};
use crate::slot::SlotStore;

/// Teardown produced by an effect body.
#[derive(Clone)]
pub struct Dispose(Rc<RefCell<Option<Box<dyn FnOnce()>>>>);

impl Dispose {
    pub fn new(f: impl FnOnce() + 'static) -> Self {
        Self(Rc::new(RefCell::new(Some(Box::new(f)))))
    }

    /// Runs at most once (safe to call multiple times).
    pub fn run(&self) {
        if let Some(f) = self.0.borrow_mut().take() {
            f()
        }
    }
}

impl std::fmt::Debug for Dispose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Dispose")
            .field(&self.0.borrow().is_some())
            .finish()
    }
}

pub(crate) type EffectBody = Box<dyn FnOnce() -> Option<Dispose>>;

/// An effect selected to run during the current pass. Collected by the
/// interpreter, flushed by the scheduler strictly after the pass commits
/// its slot and output state.
pub(crate) enum Pending {
    /// Run the previous cleanup for this slot (if any), then the body,
    /// then store the body's cleanup back into the slot.
    Run { slot: usize, body: EffectBody },
    /// Finalize: run the stored cleanup only.
    Cleanup { slot: usize },
}

#[derive(Default)]
pub(crate) struct EffectQueue {
    pending: SmallVec<[Pending; 4]>,
}

impl EffectQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push_run(&mut self, slot: usize, body: EffectBody) {
        self.pending.push(Pending::Run { slot, body });
    }

    pub(crate) fn push_cleanup(&mut self, slot: usize) {
        self.pending.push(Pending::Cleanup { slot });
    }

    /// Flushes in declaration order. Effect bodies run here, after the
    /// pass has committed; anything they schedule lands in the mutation
    /// queue and becomes a later cycle.
    pub(crate) fn flush(self, store: &mut SlotStore, probe: &mut Probe) -> Result<(), Fault> {
        for pending in self.pending {
            match pending {
                Pending::Run { slot, body } => {
                    if let Some(previous) = store.take_cleanup(slot)? {
                        previous.run();
                        probe.emit(Event::CleanupRan { slot });
                    }
                    let cleanup = body();
                    probe.emit(Event::EffectRan { slot });
                    store.store_cleanup(slot, cleanup)?;
                }
                Pending::Cleanup { slot } => {
                    if let Some(last) = store.take_cleanup(slot)? {
                        last.run();
                        probe.emit(Event::CleanupRan { slot });
                    }
                }
            }
        }
        Ok(())
    }
}
