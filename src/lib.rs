//! Coroutines backed by OS threads.
//!
//! A coroutine has two sides that take turns: the *driver*, which owns a `Handle` and calls
//! `resume`, and the *body*, a function running on a dedicated worker thread, which calls
//! `suspend`. Exactly one side runs at any time, and each handoff can carry one `Message`.
//!
//! The driver can also raise a `Condition` inside the body with `throw_in`, or stop it with
//! `cancel`. Before a `Handle` is dropped its body must have exited, either by returning or by
//! being cancelled.

mod capability;
mod error;
mod message;
mod registry;
mod slot;
mod thread;

pub use capability::{Body, Driver};
pub use error::{Error, Result};
pub use message::{AsAny, Cancelled, Condition, Message, Payload};
pub use slot::Slot;
pub use thread::{active, Builder, Coroutine, EngineId, Handle, DEFAULT_STACK_SIZE};
