//! # FluxRPC Core
//!
//! Foundation crate for the FluxRPC stack: the asynchronous primitives that
//! the layered connect operations and the session supervisors are built
//! from.
//!
//! ## Architecture
//!
//! ```text
//! fluxrpc-core/
//! ├── error.rs    # TransportError, the shared failure type
//! ├── guard.rs    # WorkTracker / WorkGuard keep-alive handles
//! ├── handler.rs  # HandlerCell, the single-slot completion holder
//! ├── event.rs    # AsyncEvent, a one-shot signal
//! ├── join.rs     # JoinLatch, an N-slot rendezvous
//! ├── queue.rs    # AsyncQueue, a single-consumer FIFO
//! └── cancel.rs   # CancelSignal, a token chain with an error payload
//! ```
//!
//! All primitives assume cooperative scheduling on a tokio runtime: state
//! transitions are serialized by short mutex-guarded sections, completions
//! are delivered by waking the waiting task, and nothing spins or blocks an
//! OS thread.

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all
)]
#![deny(unsafe_code)]

pub mod cancel;
pub mod error;
pub mod event;
pub mod guard;
pub mod handler;
pub mod join;
pub mod queue;

pub use cancel::CancelSignal;
pub use error::{TransportError, TransportResult};
pub use event::AsyncEvent;
pub use guard::{WorkGuard, WorkTracker};
pub use handler::HandlerCell;
pub use join::{EventSet, JoinLatch, JoinLatch1, JoinLatch2, JoinLatch3, Slot};
pub use queue::{AsyncQueue, QueueHandle};
