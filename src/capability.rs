//! The two views of a coroutine.
//!
//! A single engine implements both traits. Callers never see the engine itself: the driver gets
//! a `Handle`, which dereferences to `dyn Driver`, and the body gets a `Coroutine`, which
//! dereferences to `dyn Body`, so each side can only reach the operations that are valid for it.

use crate::error::Result;
use crate::message::{Condition, Message};
use crate::thread::{Coroutine, EngineId};

/// Operations for the side that owns and resumes the coroutine.
pub trait Driver: Send + Sync {
    /// Hand `message` to the body and block until it suspends or exits.
    ///
    /// Returns whatever the body passed to `suspend`, or `None` once the body has exited. Fails
    /// with `Error::Exited` if the body had already exited before the call.
    fn resume(&self, message: Option<Message>) -> Result<Option<Message>>;

    /// Raise `condition` inside the body at its pending `suspend` and block like `resume`.
    fn throw_in(&self, condition: Condition) -> Result<Option<Message>>;

    /// Terminate the body by throwing in a cancellation, then check it exited without a reply.
    ///
    /// Does nothing if the body has already exited. A body that catches the cancellation and
    /// suspends again is a protocol violation and panics here.
    fn cancel(&self);

    fn is_exited(&self) -> bool;

    /// Rename the coroutine, including its worker thread where the OS allows.
    fn set_name(&self, name: &str);

    fn name(&self) -> String;

    fn id(&self) -> EngineId;
}

/// Operations for the computation running inside the coroutine.
pub trait Body: Send + Sync {
    /// Hand `message` to the driver and block until resumed.
    ///
    /// If the driver threw in a condition, this unwinds with it instead of returning.
    fn suspend(&self, message: Option<Message>) -> Option<Message>;

    /// The coroutine of this engine type whose body is running on the calling thread, if any.
    fn active(&self) -> Option<Coroutine>;

    fn id(&self) -> EngineId;
}
