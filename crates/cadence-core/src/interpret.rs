use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::deps::Capture;
use crate::effects::{Dispose, EffectQueue};
use crate::error::Fault;
use crate::query::QueryCell;
use crate::runtime::{Driver, Event, Probe};
use crate::slot::{Slot, SlotKind, SlotStore};
use crate::state::Setter;

/// Why the hook function is being executed. Always passed explicitly;
/// the engine never branches on ambient state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reason {
    /// First pass: every primitive call allocates its slot.
    Initialize,
    /// Re-evaluation after a state commit or external action.
    Step,
    /// Teardown traversal: cleanups are queued, nothing recomputes.
    Finalize,
}

/// Pass context lent to the hook function.
///
/// Each primitive call advances the slot cursor, so the sequence of calls
/// must be identical on every pass: no primitives behind `if`, `match` on
/// data, early returns, or variable-length loops. Breaking that contract
/// is detected by cursor replay and halts the instance.
///
/// Dependency captures are explicit. A memo or effect that reads a value
/// its capture omits will silently go stale; the runtime cannot detect
/// that, it is the caller's responsibility.
pub struct Hooks<'a> {
    reason: Reason,
    store: &'a mut SlotStore,
    effects: &'a mut EffectQueue,
    queries: &'a mut QueryCell,
    driver: Weak<dyn Driver>,
    probe: &'a mut Probe,
}

impl<'a> Hooks<'a> {
    pub(crate) fn new(
        reason: Reason,
        store: &'a mut SlotStore,
        effects: &'a mut EffectQueue,
        queries: &'a mut QueryCell,
        driver: Weak<dyn Driver>,
        probe: &'a mut Probe,
    ) -> Self {
        Hooks {
            reason,
            store,
            effects,
            queries,
            driver,
            probe,
        }
    }

    pub fn reason(&self) -> Reason {
        self.reason
    }

    /// State cell. Returns the committed value and a mutation token;
    /// token writes schedule an evaluation cycle.
    pub fn use_state<T: 'static>(
        &mut self,
        init: impl FnOnce() -> T,
    ) -> Result<(Rc<T>, Setter<T>), Fault> {
        let index = match self.reason {
            Reason::Initialize => {
                let value: Rc<T> = Rc::new(init());
                self.store.allocate(Slot::State {
                    value: Box::new(value),
                })?
            }
            _ => self.store.replay(SlotKind::State)?,
        };
        let value = self.store.state_value::<T>(index)?;
        Ok((value, Setter::new(index, self.driver.clone())))
    }

    /// Mutable cell without scheduling: writes through the handle are
    /// visible only to code that reads it explicitly.
    pub fn use_ref<T: 'static>(
        &mut self,
        init: impl FnOnce() -> T,
    ) -> Result<Rc<RefCell<T>>, Fault> {
        let index = match self.reason {
            Reason::Initialize => {
                let handle: Rc<RefCell<T>> = Rc::new(RefCell::new(init()));
                self.store.allocate(Slot::Ref {
                    handle: Box::new(handle),
                })?
            }
            _ => self.store.replay(SlotKind::Ref)?,
        };
        self.store.ref_handle::<T>(index)
    }

    /// Memoized value, recomputed only when the capture differs by value
    /// from the one stored by the last recomputation.
    pub fn use_memo<D: PartialEq + 'static, T: 'static>(
        &mut self,
        deps: D,
        compute: impl FnOnce() -> T,
    ) -> Result<Rc<T>, Fault> {
        match self.reason {
            Reason::Initialize => {
                let value: Rc<T> = Rc::new(compute());
                let index = self.store.allocate(Slot::Memo {
                    deps: Capture::new(deps),
                    value: Box::new(value.clone()),
                })?;
                self.probe.emit(Event::MemoComputed { slot: index });
                Ok(value)
            }
            Reason::Step => {
                let index = self.store.replay(SlotKind::Memo)?;
                let next = Capture::new(deps);
                let changed = {
                    let prev = self.store.memo_capture(index)?;
                    if !prev.same_shape(&next) {
                        return Err(Fault::CaptureShape { index });
                    }
                    Capture::changed(Some(prev), &next)
                };
                if changed {
                    let value: Rc<T> = Rc::new(compute());
                    self.store.update_memo(index, next, value.clone())?;
                    self.probe.emit(Event::MemoComputed { slot: index });
                    Ok(value)
                } else {
                    log::trace!("memo slot {index} unchanged, returning stored value");
                    self.store.memo_value::<T>(index)
                }
            }
            Reason::Finalize => {
                let index = self.store.replay(SlotKind::Memo)?;
                self.store.memo_value::<T>(index)
            }
        }
    }

    /// Lifecycle effect: the body runs once after the initialize pass
    /// commits; its cleanup runs once at finalize.
    pub fn use_mount_effect(
        &mut self,
        body: impl FnOnce() -> Option<Dispose> + 'static,
    ) -> Result<(), Fault> {
        match self.reason {
            Reason::Initialize => {
                let index = self.store.allocate(Slot::Effect {
                    deps: None,
                    cleanup: None,
                })?;
                self.effects.push_run(index, Box::new(body));
                Ok(())
            }
            Reason::Step => {
                let index = self.store.replay(SlotKind::Effect)?;
                if self.store.effect_deps(index)?.is_some() {
                    return Err(Fault::CaptureShape { index });
                }
                Ok(())
            }
            Reason::Finalize => {
                let index = self.store.replay(SlotKind::Effect)?;
                self.effects.push_cleanup(index);
                Ok(())
            }
        }
    }

    /// Tick effect: the body runs after the initialize pass and after
    /// every step pass whose capture changed since the last run. The
    /// previous cleanup runs immediately before the new body.
    pub fn use_effect<D: PartialEq + 'static>(
        &mut self,
        deps: D,
        body: impl FnOnce() -> Option<Dispose> + 'static,
    ) -> Result<(), Fault> {
        match self.reason {
            Reason::Initialize => {
                let index = self.store.allocate(Slot::Effect {
                    deps: Some(Capture::new(deps)),
                    cleanup: None,
                })?;
                self.effects.push_run(index, Box::new(body));
                Ok(())
            }
            Reason::Step => {
                let index = self.store.replay(SlotKind::Effect)?;
                let next = Capture::new(deps);
                let changed = {
                    let Some(prev) = self.store.effect_deps(index)? else {
                        return Err(Fault::CaptureShape { index });
                    };
                    if !prev.same_shape(&next) {
                        return Err(Fault::CaptureShape { index });
                    }
                    Capture::changed(Some(prev), &next)
                };
                if changed {
                    self.store.set_effect_deps(index, next)?;
                    self.effects.push_run(index, Box::new(body));
                }
                Ok(())
            }
            Reason::Finalize => {
                let index = self.store.replay(SlotKind::Effect)?;
                self.effects.push_cleanup(index);
                Ok(())
            }
        }
    }

    /// Registers the external query handler for this pass. Occupies no
    /// slot; re-registering within one pass silently overwrites, and the
    /// last registration answers until the next pass.
    pub fn use_query<Q: 'static, A: 'static>(
        &mut self,
        handler: impl FnMut(Q) -> Option<A> + 'static,
    ) -> Result<(), Fault> {
        self.queries.install(handler);
        Ok(())
    }
}
