pub use crate::deps::Capture;
pub use crate::effects::Dispose;
pub use crate::error::Fault;
pub use crate::ext::{use_latest, use_previous};
pub use crate::interpret::{Hooks, Reason};
pub use crate::runtime::{Event, Runtime};
pub use crate::slot::SlotKind;
pub use crate::state::Setter;
