//! # vango-signals
//!
//! The reactive graph driving Vango's scheduler: writable [`State`], cached
//! [`Computed`] derivations, and [`batch`]ed writes, all safe to touch from
//! any thread.
//!
//! Dependency tracking is scoped, not global: the scheduler installs the
//! [`Runtime`] as its reactive bridge, and every signal read during a render
//! subscribes the rendering fiber. Writing a signal marks its subscribers
//! dirty; the scheduler picks them up on the next tick.
//!
//! ```
//! use vango_core::FiberId;
//! use vango_signals::{batch, Runtime, State};
//! use std::sync::{Arc, Mutex};
//!
//! let marked = Arc::new(Mutex::new(Vec::new()));
//! let sink = marked.clone();
//! let rt = Runtime::new(move |fiber| sink.lock().unwrap().push(fiber));
//!
//! let count = State::new_in(&rt, 0);
//! rt.track_fiber(FiberId(0), || {
//!     let _ = count.get();
//! });
//!
//! count.set(1);
//! assert_eq!(*marked.lock().unwrap(), vec![FiberId(0)]);
//! ```

mod computed;
mod runtime;
mod state;

pub use computed::Computed;
pub use runtime::{batch, Runtime};
pub use state::State;
