//! Helpers derived from the core primitives. Nothing here touches the
//! store directly; each helper is an ordinary hook and counts toward the
//! call order like any other.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::Fault;
use crate::interpret::Hooks;

/// The value this call site received on the previous pass, or `None` on
/// the first one. Backed by a ref slot, so tracking it never schedules a
/// cycle.
pub fn use_previous<T: 'static>(
    hooks: &mut Hooks<'_>,
    current: T,
) -> Result<Option<Rc<T>>, Fault> {
    let cell = hooks.use_ref(|| None::<Rc<T>>)?;
    let previous = cell.borrow().clone();
    *cell.borrow_mut() = Some(Rc::new(current));
    Ok(previous)
}

/// A ref mirror refreshed on every pass. Hand the handle to effect bodies
/// or callbacks that must read the freshest value without declaring it as
/// a dependency (and without re-running when it changes).
pub fn use_latest<T: Clone + 'static>(
    hooks: &mut Hooks<'_>,
    value: T,
) -> Result<Rc<RefCell<T>>, Fault> {
    let cell = hooks.use_ref(|| value.clone())?;
    *cell.borrow_mut() = value;
    Ok(cell)
}
