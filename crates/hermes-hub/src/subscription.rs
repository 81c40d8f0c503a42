//! Subscription guard

use std::sync::Arc;

use tokio::sync::mpsc::error::TryRecvError;

use hermes_core::Message;

use crate::{Hub, MessageReceiver, SubscriberId};

/// Receiving end of a hub registration
///
/// Created by [`Hub::subscribe_channel`]; unsubscribes when dropped, so a
/// connection handler that exits for any reason releases its mailbox.
pub struct Subscription {
    id: SubscriberId,
    rx: MessageReceiver,
    hub: Arc<Hub>,
}

impl Subscription {
    pub(crate) fn new(id: SubscriberId, rx: MessageReceiver, hub: Arc<Hub>) -> Self {
        Subscription { id, rx, hub }
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Wait for the next message. `None` once the hub dropped the sender.
    pub async fn recv(&mut self) -> Option<Arc<Message>> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Result<Arc<Message>, TryRecvError> {
        self.rx.try_recv()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.hub.unsubscribe(self.id);
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
