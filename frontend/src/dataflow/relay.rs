//! Event input channel from the host into a screen component.
//!
//! Relays carry user actions (button clicks, "start" requests) into the
//! processing loop of an [`Actor`](super::Actor) using a plain unbounded
//! channel.

use crate::error::RelayError;
use futures::channel::mpsc::{UnboundedReceiver, UnboundedSender, unbounded};

/// Type-safe event relay.
///
/// Relays follow the `{source}_{event}_relay` naming pattern at the use
/// site, e.g. `increment_clicked_relay`.
///
/// # Examples
///
/// ```rust
/// use frontend::dataflow::relay;
/// use futures::StreamExt;
///
/// # futures::executor::block_on(async {
/// let (increment_clicked_relay, mut clicks) = relay::<()>();
/// increment_clicked_relay.send(());
/// assert_eq!(clicks.next().await, Some(()));
/// # });
/// ```
#[derive(Clone, Debug)]
pub struct Relay<T>
where
    T: Send + 'static,
{
    sender: UnboundedSender<T>,
}

impl<T> Relay<T>
where
    T: Send + 'static,
{
    /// Create a new Relay with its receiving stream.
    pub fn new() -> (Self, UnboundedReceiver<T>) {
        let (sender, receiver) = unbounded();
        (Relay { sender }, receiver)
    }

    /// Send an event through the relay.
    ///
    /// If the receiver has been dropped (its component is gone) the event is
    /// silently discarded. Use [`Relay::try_send`] to observe that.
    pub fn send(&self, value: T) {
        if self.sender.unbounded_send(value).is_err() {
            log::trace!("relay event dropped, receiver is gone");
        }
    }

    /// Send an event, reporting a dropped receiver.
    pub fn try_send(&self, value: T) -> Result<(), RelayError> {
        self.sender
            .unbounded_send(value)
            .map_err(|_| RelayError::ChannelClosed)
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

impl<T> Default for Relay<T>
where
    T: Send + 'static,
{
    /// A disconnected relay whose events go nowhere.
    fn default() -> Self {
        let (relay, _receiver) = Self::new();
        relay
    }
}

/// Creates a new Relay with an associated receiver stream.
pub fn relay<T>() -> (Relay<T>, UnboundedReceiver<T>)
where
    T: Send + 'static,
{
    Relay::new()
}
