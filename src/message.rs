use std::any::Any;
use std::fmt;

/// A value that can travel between the driver and the body of a coroutine.
///
/// Payloads are moved, never shared: whoever holds the `Message` owns it.
pub trait Payload: AsAny + Send {
    /// Human-readable description, used in diagnostics.
    fn describe(&self) -> String;
}

/// Upcasting support for `Payload`, implemented for every `'static` type.
pub trait AsAny {
    fn as_any(&self) -> &dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// A type-erased payload in flight between the two sides of a coroutine.
pub struct Message(Box<dyn Payload>);

impl Message {
    pub fn new<P: Payload + 'static>(payload: P) -> Message {
        Message(Box::new(payload))
    }

    pub fn describe(&self) -> String {
        self.0.describe()
    }

    /// Borrow the payload as a `P`, if that is what it is.
    pub fn peek<P: Payload + 'static>(&self) -> Option<&P> {
        <dyn Payload as AsAny>::as_any(&*self.0).downcast_ref::<P>()
    }

    /// Whether the payload is a `P`.
    pub fn is<P: Payload + 'static>(&self) -> bool {
        self.peek::<P>().is_some()
    }

    /// Take the payload out as a `P`. On a type mismatch the message is handed back intact.
    pub fn downcast<P: Payload + 'static>(self) -> Result<Box<P>, Message> {
        if !self.is::<P>() {
            return Err(self);
        }
        match <dyn Payload as AsAny>::into_any(self.0).downcast::<P>() {
            Ok(payload) => Ok(payload),
            Err(_) => unreachable!("payload type was checked before downcast"),
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_tuple("Message").field(&self.describe()).finish()
    }
}

/// The condition delivered to a body by `Driver::cancel()`.
///
/// The worker thread treats a body unwinding with this value as a clean exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cancelled;

/// An exception-like signal occupying the same slot as a `Message`.
///
/// Conditions travel driver-to-body through `Driver::throw_in`, where they surface as an unwind
/// out of `Body::suspend`, and body-to-driver when a body panics.
pub struct Condition(Box<dyn Any + Send>);

impl Condition {
    pub fn new<E: Any + Send>(value: E) -> Condition {
        Condition(Box::new(value))
    }

    pub fn cancellation() -> Condition {
        Condition::new(Cancelled)
    }

    /// Wrap a payload captured by `std::panic::catch_unwind`.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Condition {
        Condition(payload)
    }

    pub fn is_cancellation(&self) -> bool {
        self.0.is::<Cancelled>()
    }

    pub fn downcast_ref<E: Any>(&self) -> Option<&E> {
        self.0.downcast_ref::<E>()
    }

    /// The raw payload, suitable for `std::panic::resume_unwind`.
    pub fn into_panic(self) -> Box<dyn Any + Send> {
        self.0
    }

    /// Best-effort description: cancellation, or the text of a string panic.
    pub fn describe(&self) -> String {
        if self.is_cancellation() {
            "cancellation".to_string()
        } else if let Some(s) = self.0.downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = self.0.downcast_ref::<String>() {
            s.clone()
        } else {
            "opaque condition".to_string()
        }
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_tuple("Condition").field(&self.describe()).finish()
    }
}
