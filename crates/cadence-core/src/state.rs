use std::marker::PhantomData;
use std::rc::{Rc, Weak};

use crate::error::Fault;
use crate::runtime::{Commit, Driver};

/// Mutation token for a state slot.
///
/// Writes route through the scheduler: each one commits at the start of
/// its own evaluation cycle and is followed by a Step pass. Tokens are
/// cheap to clone and safe to move into callbacks and effect bodies; a
/// write after the owning instance is finalized (or dropped) fails with
/// [`Fault::Finalized`] instead of resurrecting it.
pub struct Setter<T: 'static> {
    slot: usize,
    driver: Weak<dyn Driver>,
    _value: PhantomData<fn(T)>,
}

impl<T: 'static> Setter<T> {
    pub(crate) fn new(slot: usize, driver: Weak<dyn Driver>) -> Self {
        Setter {
            slot,
            driver,
            _value: PhantomData,
        }
    }

    /// Replaces the stored value and schedules an evaluation cycle.
    pub fn set(&self, value: T) -> Result<(), Fault> {
        self.update(move |_| value)
    }

    /// Computes the next value from the committed current one. The
    /// closure runs at commit time, so chained updates in one burst each
    /// observe their predecessor.
    pub fn update(&self, f: impl FnOnce(&T) -> T + 'static) -> Result<(), Fault> {
        let slot = self.slot;
        let commit: Commit = Box::new(move |store| {
            let current = store.state_value::<T>(slot)?;
            let next = Rc::new(f(&current));
            store.write_state(slot, next)
        });
        match self.driver.upgrade() {
            Some(driver) => driver.enqueue(Some(commit)),
            None => Err(Fault::Finalized),
        }
    }
}

impl<T: 'static> Clone for Setter<T> {
    fn clone(&self) -> Self {
        Setter {
            slot: self.slot,
            driver: self.driver.clone(),
            _value: PhantomData,
        }
    }
}

impl<T: 'static> std::fmt::Debug for Setter<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Setter").field("slot", &self.slot).finish()
    }
}
