//! # Hook evaluation engine
//!
//! Cadence lets reusable stateful logic (state cells, memoized values,
//! effects with cleanup, external query handlers) be written as one
//! ordinary function and re-evaluated correctly across a host component's
//! lifecycle. The pieces:
//!
//! - [`Runtime`] — host driver: owns the slot store and sequences
//!   evaluation cycles.
//! - [`Hooks`] — pass context handed to the hook function; every
//!   primitive call site gets a stable storage slot.
//! - [`Setter`] — mutation token for a state cell; writes schedule a
//!   cycle.
//! - [`Dispose`] — effect teardown guard.
//!
//! ## A hook function
//!
//! The hook function runs once per interpretation pass. Each primitive
//! call advances a cursor over the slot store, so the call sequence must
//! be the same on every pass: no hooks behind `if` or data-dependent
//! loops. The engine checks this at runtime and halts the instance on a
//! violation.
//!
//! ```rust
//! use cadence_core::Runtime;
//!
//! let runtime = Runtime::new(|hooks| {
//!     let (count, bump) = hooks.use_state(|| 0i32)?;
//!     let label = hooks.use_memo(*count, || format!("count = {}", *count))?;
//!     Ok((label, bump))
//! });
//!
//! runtime.initialize()?;
//! runtime.with_output(|(label, _)| assert_eq!(label.as_str(), "count = 0"));
//!
//! let bump = runtime.with_output(|(_, bump)| bump.clone()).unwrap();
//! bump.update(|n| n + 1)?;
//! runtime.with_output(|(label, _)| assert_eq!(label.as_str(), "count = 1"));
//!
//! runtime.finalize()?;
//! # Ok::<(), cadence_core::Fault>(())
//! ```
//!
//! ## Evaluation cycle
//!
//! A token write (or [`Runtime::step`]) enqueues a mutation request.
//! Requests drain FIFO, one full cycle each: commit the write, re-run the
//! hook function under `Step`, flush effects whose captures changed, emit
//! the new output to the host's render callback. At most one cycle is in
//! flight; writes issued from effect bodies or callbacks queue behind the
//! current one.
//!
//! ## Effects and cleanup
//!
//! ```rust
//! use cadence_core::{Dispose, Runtime};
//!
//! let runtime = Runtime::new(|hooks| {
//!     let (n, set_n) = hooks.use_state(|| 0u32)?;
//!     let n_now = *n;
//!     hooks.use_effect(*n, move || {
//!         log::debug!("n is now {n_now}");
//!         Some(Dispose::new(move || log::debug!("dropping watcher for {n_now}")))
//!     })?;
//!     Ok(set_n)
//! });
//! runtime.initialize()?;
//! runtime.finalize()?;
//! # Ok::<(), cadence_core::Fault>(())
//! ```
//!
//! A tick effect re-runs only when its dependency capture differs by
//! value from the previous run, and its old cleanup runs right before
//! the new body. [`Hooks::use_mount_effect`] runs once at initialize and
//! cleans up once at finalize.
//!
//! Captures are explicit. Depend on everything the body reads: the
//! engine cannot notice an omitted value, the effect just goes stale.
//!
//! ## Output vs internals
//!
//! The host only ever sees the value the hook function returns. The slot
//! store and cursor stay behind the [`Runtime`] handle, so host-side
//! change detection never observes bookkeeping writes.

pub mod deps;
pub mod effects;
pub mod error;
pub mod ext;
pub mod interpret;
pub mod prelude;
mod query;
pub mod runtime;
pub mod slot;
pub mod state;
pub mod tests;

pub use deps::*;
pub use effects::*;
pub use error::*;
pub use ext::*;
pub use interpret::*;
pub use runtime::*;
pub use slot::*;
pub use state::*;
