use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

use crate::effects::EffectQueue;
use crate::error::Fault;
use crate::interpret::{Hooks, Reason};
use crate::query::{self, QueryCell};
use crate::slot::SlotStore;

/// Engine event, observable through [`Runtime::set_probe`]. Also mirrored
/// at `log::trace!`. The slot index identifies the primitive call site in
/// declaration order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    PassStarted(Reason),
    StateCommitted,
    MemoComputed { slot: usize },
    EffectRan { slot: usize },
    CleanupRan { slot: usize },
    Rendered,
}

/// Optional event tap. Detached while a pass runs so the interpreter can
/// emit without re-borrowing the runtime.
pub(crate) struct Probe(Option<Box<dyn FnMut(&Event)>>);

impl Probe {
    fn none() -> Self {
        Probe(None)
    }

    pub(crate) fn emit(&mut self, event: Event) {
        log::trace!("{event:?}");
        if let Some(tap) = self.0.as_mut() {
            tap(&event);
        }
    }

    fn take(&mut self) -> Probe {
        Probe(self.0.take())
    }

    fn restore(&mut self, detached: Probe) {
        if self.0.is_none() {
            self.0 = detached.0;
        }
    }
}

/// A state mutation waiting for its evaluation cycle: applied to the slot
/// store at commit time, before the Step pass of that cycle.
pub(crate) type Commit = Box<dyn FnOnce(&mut SlotStore) -> Result<(), Fault>>;

/// Scheduler entry point shared with mutation tokens. `None` is an
/// external action: a cycle with nothing to commit.
pub(crate) trait Driver {
    fn enqueue(&self, commit: Option<Commit>) -> Result<(), Fault>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Created,
    Idle,
    Running,
    Finalized,
    Halted,
}

type HookFn<O> = Box<dyn FnMut(&mut Hooks<'_>) -> Result<O, Fault>>;

struct Inner<O: 'static> {
    hook_fn: RefCell<HookFn<O>>,
    store: RefCell<SlotStore>,
    queries: RefCell<QueryCell>,
    queue: RefCell<VecDeque<Option<Commit>>>,
    phase: Cell<Phase>,
    driving: Cell<bool>,
    finalizing: Cell<bool>,
    fault: RefCell<Option<Fault>>,
    output: RefCell<Option<O>>,
    on_render: RefCell<Option<Box<dyn FnMut(&O)>>>,
    probe: RefCell<Probe>,
    weak_self: Weak<Inner<O>>,
}

/// Host driver for one hook instance.
///
/// Owns the slot store, the hook function, and the evaluation cycle
/// scheduler. The host sees only the emitted output value; the store and
/// cursor stay behind this handle, so host-side change detection never
/// observes intermediate bookkeeping writes.
///
/// The protocol is: [`initialize`](Runtime::initialize) exactly once,
/// any number of token writes / [`step`](Runtime::step) /
/// [`query`](Runtime::query) calls, then
/// [`finalize`](Runtime::finalize) exactly once.
pub struct Runtime<O: 'static> {
    inner: Rc<Inner<O>>,
}

impl<O: 'static> Clone for Runtime<O> {
    fn clone(&self) -> Self {
        Runtime {
            inner: self.inner.clone(),
        }
    }
}

impl<O: 'static> Runtime<O> {
    pub fn new(hook_fn: impl FnMut(&mut Hooks<'_>) -> Result<O, Fault> + 'static) -> Self {
        let inner = Rc::new_cyclic(|weak_self: &Weak<Inner<O>>| Inner {
            hook_fn: RefCell::new(Box::new(hook_fn)),
            store: RefCell::new(SlotStore::new()),
            queries: RefCell::new(QueryCell::new()),
            queue: RefCell::new(VecDeque::new()),
            phase: Cell::new(Phase::Created),
            driving: Cell::new(false),
            finalizing: Cell::new(false),
            fault: RefCell::new(None),
            output: RefCell::new(None),
            on_render: RefCell::new(None),
            probe: RefCell::new(Probe::none()),
            weak_self: weak_self.clone(),
        });
        Runtime { inner }
    }

    /// Installs the host render callback, invoked once per cycle with the
    /// freshly emitted output.
    pub fn on_render(&self, f: impl FnMut(&O) + 'static) {
        *self.inner.on_render.borrow_mut() = Some(Box::new(f));
    }

    /// Installs the event tap.
    pub fn set_probe(&self, f: impl FnMut(&Event) + 'static) {
        self.inner.probe.borrow_mut().0 = Some(Box::new(f));
    }

    /// Read access to the last emitted output. `None` before the first
    /// pass completes.
    pub fn with_output<R>(&self, f: impl FnOnce(&O) -> R) -> Option<R> {
        self.inner.output.borrow().as_ref().map(f)
    }

    /// Runs the initialize pass: allocates every slot, runs every effect
    /// body, emits the first output. Cycles scheduled by those effect
    /// bodies are drained before this returns.
    pub fn initialize(&self) -> Result<(), Fault> {
        let inner = &*self.inner;
        if let Some(fault) = inner.stored_fault() {
            return Err(fault);
        }
        match inner.phase.get() {
            Phase::Created => {}
            Phase::Running => return Err(Fault::Reentrant),
            Phase::Finalized => return Err(Fault::Finalized),
            _ => return Err(Fault::AlreadyInitialized),
        }
        inner.with_drive(|inner| {
            inner.phase.set(Phase::Running);
            inner.run_pass(Reason::Initialize)?;
            inner.phase.set(Phase::Idle);
            inner.drain()
        })
    }

    /// External action entry: schedules a cycle with nothing to commit.
    /// Useful when the host mutated refs or external inputs and wants the
    /// output re-derived.
    pub fn step(&self) -> Result<(), Fault> {
        self.inner.enqueue(None)
    }

    /// Routes a query payload to the handler registered by the last pass.
    /// `Ok(None)` means no handler answered (none registered, the handler
    /// declined, or it was registered for different types).
    pub fn query<Q: 'static, A: 'static>(&self, payload: Q) -> Result<Option<A>, Fault> {
        let inner = &*self.inner;
        if let Some(fault) = inner.stored_fault() {
            return Err(fault);
        }
        match inner.phase.get() {
            Phase::Idle => {}
            Phase::Created => return Err(Fault::NotInitialized),
            Phase::Running => return Err(Fault::Reentrant),
            _ => return Err(Fault::Finalized),
        }
        let Some(mut handler) = inner.queries.borrow_mut().take() else {
            return Ok(None);
        };
        let answer = query::call_handler::<Q, A>(&mut handler, payload);
        inner.queries.borrow_mut().restore(Some(handler));
        Ok(answer)
    }

    /// Runs the finalize pass: queued cleanups run in declaration order,
    /// the final output is emitted, the store is torn down. No further
    /// pass or mutation is accepted afterwards.
    pub fn finalize(&self) -> Result<(), Fault> {
        let inner = &*self.inner;
        if let Some(fault) = inner.stored_fault() {
            return Err(fault);
        }
        match inner.phase.get() {
            Phase::Idle => {}
            Phase::Created => return Err(Fault::NotInitialized),
            Phase::Running => return Err(Fault::Reentrant),
            _ => return Err(Fault::Finalized),
        }
        inner.finalizing.set(true);
        inner.with_drive(|inner| {
            inner.phase.set(Phase::Running);
            inner.run_pass(Reason::Finalize)
        })?;
        inner.store.borrow_mut().clear();
        inner.queries.borrow_mut().reset();
        inner.queue.borrow_mut().clear();
        inner.phase.set(Phase::Finalized);
        Ok(())
    }
}

impl<O: 'static> Driver for Inner<O> {
    fn enqueue(&self, commit: Option<Commit>) -> Result<(), Fault> {
        if let Some(fault) = self.stored_fault() {
            return Err(fault);
        }
        if self.finalizing.get() || self.phase.get() == Phase::Finalized {
            return Err(Fault::Finalized);
        }
        if self.phase.get() == Phase::Created {
            return Err(Fault::NotInitialized);
        }
        self.queue.borrow_mut().push_back(commit);
        if self.driving.get() {
            return Ok(());
        }
        self.with_drive(|inner| inner.drain())
    }
}

impl<O: 'static> Inner<O> {
    fn stored_fault(&self) -> Option<Fault> {
        self.fault.borrow().clone()
    }

    fn halt(&self, fault: Fault) {
        log::error!("hook instance halted: {fault}");
        self.phase.set(Phase::Halted);
        *self.fault.borrow_mut() = Some(fault);
    }

    /// Single-flight guard: everything that can start passes goes through
    /// here, so a request arriving mid-drive only ever queues.
    fn with_drive(&self, f: impl FnOnce(&Self) -> Result<(), Fault>) -> Result<(), Fault> {
        self.driving.set(true);
        let result = f(self);
        self.driving.set(false);
        if let Err(fault) = &result {
            if fault.is_fatal() {
                self.halt(fault.clone());
            }
        }
        result
    }

    /// Drains queued mutation requests in FIFO order, one full cycle
    /// each: commit, Step pass, effect flush, render.
    fn drain(&self) -> Result<(), Fault> {
        loop {
            let next = self.queue.borrow_mut().pop_front();
            let Some(commit) = next else {
                return Ok(());
            };
            self.phase.set(Phase::Running);
            if let Some(commit) = commit {
                commit(&mut self.store.borrow_mut())?;
                self.tap(Event::StateCommitted);
            }
            self.run_pass(Reason::Step)?;
            self.phase.set(Phase::Idle);
        }
    }

    fn tap(&self, event: Event) {
        let mut probe = self.probe.borrow_mut().take();
        probe.emit(event);
        self.probe.borrow_mut().restore(probe);
    }

    /// One interpretation pass: cursor reset, hook function execution,
    /// cursor accounting, output commit, effect flush, render.
    fn run_pass(&self, reason: Reason) -> Result<(), Fault> {
        let mut probe = self.probe.borrow_mut().take();
        probe.emit(Event::PassStarted(reason));
        let result = (|| {
            let mut store = self.store.borrow_mut();
            store.begin_pass(reason)?;
            let mut queries = self.queries.borrow_mut();
            queries.reset();
            let mut effects = EffectQueue::new();
            let driver: Weak<dyn Driver> = self.weak_self.clone();
            let output = {
                let mut hook_fn = self.hook_fn.borrow_mut();
                let mut hooks = Hooks::new(
                    reason,
                    &mut store,
                    &mut effects,
                    &mut queries,
                    driver,
                    &mut probe,
                );
                (*hook_fn)(&mut hooks)?
            };
            store.end_pass()?;
            *self.output.borrow_mut() = Some(output);
            effects.flush(&mut store, &mut probe)
        })();
        self.probe.borrow_mut().restore(probe);
        result?;
        self.tap(Event::Rendered);
        self.render();
        Ok(())
    }

    fn render(&self) {
        let taken = self.on_render.borrow_mut().take();
        if let Some(mut callback) = taken {
            {
                let output = self.output.borrow();
                if let Some(output) = output.as_ref() {
                    callback(output);
                }
            }
            let mut slot = self.on_render.borrow_mut();
            if slot.is_none() {
                *slot = Some(callback);
            }
        }
    }
}

impl<O: 'static> Drop for Inner<O> {
    fn drop(&mut self) {
        if matches!(self.phase.get(), Phase::Idle | Phase::Running) {
            log::warn!("hook instance dropped without finalize; running effect cleanups");
            let cleanups = self.store.borrow_mut().drain_cleanups();
            for cleanup in cleanups {
                cleanup.run();
            }
        }
    }
}
