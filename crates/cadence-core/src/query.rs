use std::any::Any;

/// Handler cell for external queries.
///
/// One cell per instance. It is cleared at the start of every pass and
/// overwritten by each registration within the pass, so the last
/// registration answers queries until the next pass re-registers.
/// Overwriting is intentional and deliberately silent.
pub(crate) struct QueryCell {
    handler: Option<Box<dyn Any>>,
}

struct Registered<Q, A> {
    call: Box<dyn FnMut(Q) -> Option<A>>,
}

impl QueryCell {
    pub(crate) fn new() -> Self {
        QueryCell { handler: None }
    }

    pub(crate) fn reset(&mut self) {
        self.handler = None;
    }

    pub(crate) fn install<Q: 'static, A: 'static>(
        &mut self,
        handler: impl FnMut(Q) -> Option<A> + 'static,
    ) {
        self.handler = Some(Box::new(Registered::<Q, A> {
            call: Box::new(handler),
        }));
    }

    /// Detaches the handler so it can be invoked without holding the
    /// cell borrowed (the handler may schedule cycles that re-enter the
    /// registry).
    pub(crate) fn take(&mut self) -> Option<Box<dyn Any>> {
        self.handler.take()
    }

    /// Puts a detached handler back unless a pass installed a fresh one
    /// in the meantime (the fresh registration wins).
    pub(crate) fn restore(&mut self, handler: Option<Box<dyn Any>>) {
        if self.handler.is_none() {
            self.handler = handler;
        }
    }
}

/// Invokes a detached handler with the payload. A handler registered for
/// different types answers nothing, which the dispatcher reports as "no
/// handler".
pub(crate) fn call_handler<Q: 'static, A: 'static>(
    handler: &mut Box<dyn Any>,
    payload: Q,
) -> Option<A> {
    let registered = handler.downcast_mut::<Registered<Q, A>>()?;
    (registered.call)(payload)
}
