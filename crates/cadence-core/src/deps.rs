use std::any::Any;

/// A dependency capture: the snapshot of values a memo or tick effect
/// declares as its recomputation trigger.
///
/// Captures are supplied explicitly at the call site, typically as a tuple
/// of the values the computation reads. Anything `PartialEq` works. The
/// capture is type-erased so heterogeneous captures can live in one slot
/// store; equality is delegated to a comparison function monomorphized at
/// construction time.
pub struct Capture {
    value: Box<dyn Any>,
    eq: fn(&dyn Any, &dyn Any) -> bool,
}

impl Capture {
    pub fn new<D: PartialEq + 'static>(deps: D) -> Self {
        fn eq_as<D: PartialEq + 'static>(a: &dyn Any, b: &dyn Any) -> bool {
            match (a.downcast_ref::<D>(), b.downcast_ref::<D>()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            }
        }
        Capture {
            value: Box::new(deps),
            eq: eq_as::<D>,
        }
    }

    /// True when both captures were built from the same dependency type.
    /// A shape change between passes is a call order violation, not a
    /// "changed" result; the interpreter checks this before comparing.
    pub fn same_shape(&self, other: &Capture) -> bool {
        self.value.as_ref().type_id() == other.value.as_ref().type_id()
    }

    /// The single comparison primitive behind memo recomputation and tick
    /// effect re-run decisions. A missing previous capture counts as
    /// changed (first run always fires).
    pub fn changed(prev: Option<&Capture>, next: &Capture) -> bool {
        match prev {
            Some(prev) => !(next.eq)(prev.value.as_ref(), next.value.as_ref()),
            None => true,
        }
    }
}

impl std::fmt::Debug for Capture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capture")
            .field("type_id", &self.value.as_ref().type_id())
            .finish_non_exhaustive()
    }
}
