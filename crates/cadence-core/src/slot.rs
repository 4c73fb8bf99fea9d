use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use crate::deps::Capture;
use crate::effects::Dispose;
use crate::error::Fault;
use crate::interpret::Reason;

/// Public discriminant of a slot, used in fault reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotKind {
    State,
    Ref,
    Memo,
    Effect,
}

impl std::fmt::Display for SlotKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SlotKind::State => "state",
            SlotKind::Ref => "ref",
            SlotKind::Memo => "memo",
            SlotKind::Effect => "effect",
        };
        f.write_str(name)
    }
}

/// One storage cell backing a primitive call site. Values are stored
/// behind `dyn Any` (an `Rc<T>` for state and memo, an `Rc<RefCell<T>>`
/// for refs) so the store stays homogeneous without unchecked casts; the
/// variant tag carries the kind.
pub(crate) enum Slot {
    State {
        value: Box<dyn Any>,
    },
    Ref {
        handle: Box<dyn Any>,
    },
    Memo {
        deps: Capture,
        value: Box<dyn Any>,
    },
    /// `deps` is `None` for lifecycle (mount) effects and `Some` for tick
    /// effects; `cleanup` holds the teardown returned by the last run.
    Effect {
        deps: Option<Capture>,
        cleanup: Option<Dispose>,
    },
}

impl Slot {
    pub(crate) fn kind(&self) -> SlotKind {
        match self {
            Slot::State { .. } => SlotKind::State,
            Slot::Ref { .. } => SlotKind::Ref,
            Slot::Memo { .. } => SlotKind::Memo,
            Slot::Effect { .. } => SlotKind::Effect,
        }
    }
}

/// Ordered, growable sequence of slots plus the replay cursor.
///
/// Growth happens only through `allocate` during the initialize pass.
/// Every later pass must visit the same kinds in the same order via
/// `replay`; under- or over-running the stored length is a fatal
/// consistency fault surfaced by `replay` / `end_pass`.
pub(crate) struct SlotStore {
    slots: Vec<Slot>,
    cursor: usize,
}

impl SlotStore {
    pub(crate) fn new() -> Self {
        SlotStore {
            slots: Vec::new(),
            cursor: 0,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn begin_pass(&mut self, reason: Reason) -> Result<(), Fault> {
        if reason == Reason::Initialize && !self.slots.is_empty() {
            return Err(Fault::AlreadyInitialized);
        }
        self.cursor = 0;
        Ok(())
    }

    pub(crate) fn end_pass(&mut self) -> Result<(), Fault> {
        if self.cursor != self.slots.len() {
            return Err(Fault::CursorMismatch {
                visited: self.cursor,
                stored: self.slots.len(),
            });
        }
        Ok(())
    }

    /// Appends a slot at the cursor. Only legal while the cursor sits at
    /// the current end, which is only ever true during initialize.
    pub(crate) fn allocate(&mut self, slot: Slot) -> Result<usize, Fault> {
        if self.cursor != self.slots.len() {
            return Err(Fault::LateAllocation);
        }
        let index = self.cursor;
        self.slots.push(slot);
        self.cursor += 1;
        Ok(index)
    }

    /// Advances the cursor over the existing slot at its position,
    /// asserting kind compatibility.
    pub(crate) fn replay(&mut self, kind: SlotKind) -> Result<usize, Fault> {
        let index = self.cursor;
        let Some(slot) = self.slots.get(index) else {
            return Err(Fault::CursorMismatch {
                visited: index + 1,
                stored: self.slots.len(),
            });
        };
        if slot.kind() != kind {
            return Err(Fault::KindMismatch {
                index,
                expected: kind,
                found: slot.kind(),
            });
        }
        self.cursor += 1;
        Ok(index)
    }

    fn slot(&self, index: usize) -> Result<&Slot, Fault> {
        self.slots.get(index).ok_or(Fault::MissingSlot { index })
    }

    fn slot_mut(&mut self, index: usize) -> Result<&mut Slot, Fault> {
        self.slots
            .get_mut(index)
            .ok_or(Fault::MissingSlot { index })
    }

    fn kind_mismatch(&self, index: usize, expected: SlotKind) -> Fault {
        match self.slots.get(index) {
            Some(slot) => Fault::KindMismatch {
                index,
                expected,
                found: slot.kind(),
            },
            None => Fault::MissingSlot { index },
        }
    }

    pub(crate) fn state_value<T: 'static>(&self, index: usize) -> Result<Rc<T>, Fault> {
        match self.slot(index)? {
            Slot::State { value } => value
                .downcast_ref::<Rc<T>>()
                .cloned()
                .ok_or(Fault::PayloadMismatch { index }),
            _ => Err(self.kind_mismatch(index, SlotKind::State)),
        }
    }

    pub(crate) fn write_state<T: 'static>(
        &mut self,
        index: usize,
        next: Rc<T>,
    ) -> Result<(), Fault> {
        match self.slot_mut(index)? {
            Slot::State { value } => {
                if value.downcast_ref::<Rc<T>>().is_none() {
                    return Err(Fault::PayloadMismatch { index });
                }
                *value = Box::new(next);
                Ok(())
            }
            _ => Err(self.kind_mismatch(index, SlotKind::State)),
        }
    }

    pub(crate) fn ref_handle<T: 'static>(&self, index: usize) -> Result<Rc<RefCell<T>>, Fault> {
        match self.slot(index)? {
            Slot::Ref { handle } => handle
                .downcast_ref::<Rc<RefCell<T>>>()
                .cloned()
                .ok_or(Fault::PayloadMismatch { index }),
            _ => Err(self.kind_mismatch(index, SlotKind::Ref)),
        }
    }

    pub(crate) fn memo_value<T: 'static>(&self, index: usize) -> Result<Rc<T>, Fault> {
        match self.slot(index)? {
            Slot::Memo { value, .. } => value
                .downcast_ref::<Rc<T>>()
                .cloned()
                .ok_or(Fault::PayloadMismatch { index }),
            _ => Err(self.kind_mismatch(index, SlotKind::Memo)),
        }
    }

    pub(crate) fn memo_capture(&self, index: usize) -> Result<&Capture, Fault> {
        match self.slot(index)? {
            Slot::Memo { deps, .. } => Ok(deps),
            _ => Err(self.kind_mismatch(index, SlotKind::Memo)),
        }
    }

    pub(crate) fn update_memo<T: 'static>(
        &mut self,
        index: usize,
        next_deps: Capture,
        next_value: Rc<T>,
    ) -> Result<(), Fault> {
        match self.slot_mut(index)? {
            Slot::Memo { deps, value } => {
                *deps = next_deps;
                *value = Box::new(next_value);
                Ok(())
            }
            _ => Err(self.kind_mismatch(index, SlotKind::Memo)),
        }
    }

    pub(crate) fn effect_deps(&self, index: usize) -> Result<Option<&Capture>, Fault> {
        match self.slot(index)? {
            Slot::Effect { deps, .. } => Ok(deps.as_ref()),
            _ => Err(self.kind_mismatch(index, SlotKind::Effect)),
        }
    }

    pub(crate) fn set_effect_deps(&mut self, index: usize, next: Capture) -> Result<(), Fault> {
        match self.slot_mut(index)? {
            Slot::Effect { deps, .. } => {
                *deps = Some(next);
                Ok(())
            }
            _ => Err(self.kind_mismatch(index, SlotKind::Effect)),
        }
    }

    pub(crate) fn take_cleanup(&mut self, index: usize) -> Result<Option<Dispose>, Fault> {
        match self.slot_mut(index)? {
            Slot::Effect { cleanup, .. } => Ok(cleanup.take()),
            _ => Err(self.kind_mismatch(index, SlotKind::Effect)),
        }
    }

    pub(crate) fn store_cleanup(
        &mut self,
        index: usize,
        next: Option<Dispose>,
    ) -> Result<(), Fault> {
        match self.slot_mut(index)? {
            Slot::Effect { cleanup, .. } => {
                *cleanup = next;
                Ok(())
            }
            _ => Err(self.kind_mismatch(index, SlotKind::Effect)),
        }
    }

    /// Remaining effect cleanups in declaration order, for best-effort
    /// teardown when the instance is dropped without a finalize pass.
    pub(crate) fn drain_cleanups(&mut self) -> Vec<Dispose> {
        self.slots
            .iter_mut()
            .filter_map(|slot| match slot {
                Slot::Effect { cleanup, .. } => cleanup.take(),
                _ => None,
            })
            .collect()
    }

    /// Finalize teardown. No slot survives this.
    pub(crate) fn clear(&mut self) {
        log::trace!("slot store cleared ({} slots)", self.len());
        self.slots.clear();
        self.cursor = 0;
    }
}
