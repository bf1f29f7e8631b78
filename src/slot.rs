use crate::message::{Condition, Message};

/// The one-slot channel between driver and body.
///
/// Holds at most one value: a `Message`, or a `Condition`, never both. There is no locking here;
/// the slot only ever lives inside the engine's guarded state.
#[derive(Debug, Default)]
pub struct Slot {
    message: Option<Message>,
    raised: Option<Condition>,
}

impl Slot {
    pub fn new() -> Slot {
        Slot::default()
    }

    pub fn is_empty(&self) -> bool {
        self.message.is_none() && self.raised.is_none()
    }

    /// Store a message. `None` leaves the slot empty.
    ///
    /// # Panics
    ///
    /// Panics if the slot is already occupied.
    pub fn put(&mut self, message: Option<Message>) {
        assert!(self.is_empty(), "put into an occupied slot: {:?}", self);
        self.message = message;
    }

    pub fn take(&mut self) -> Option<Message> {
        self.message.take()
    }

    /// Store a condition.
    ///
    /// # Panics
    ///
    /// Panics if the slot is already occupied.
    pub fn raise(&mut self, condition: Condition) {
        assert!(self.is_empty(), "raise into an occupied slot: {:?}", self);
        self.raised = Some(condition);
    }

    pub fn take_raised(&mut self) -> Option<Condition> {
        self.raised.take()
    }

    /// Empty the slot, whatever it holds.
    pub fn clear(&mut self) {
        self.message = None;
        self.raised = None;
    }

    /// Take the delivered value on the receiving side: either the message or the condition.
    pub fn receive(&mut self) -> Result<Option<Message>, Condition> {
        assert!(
            self.message.is_none() || self.raised.is_none(),
            "slot holds a message and a condition at once"
        );
        match self.raised.take() {
            Some(condition) => Err(condition),
            None => Ok(self.message.take()),
        }
    }
}
