//! Identity notifications from the session provider.
//!
//! The provider side holds an [`IdentityPublisher`]; consumers such as the
//! favorites reconciler read an [`IdentityFeed`]. Only the latest identity is
//! retained, so a slow consumer sees the newest state rather than a backlog.

use tokio::sync::watch;

use crate::models::Identity;

/// Create a connected publisher/feed pair seeded with `initial`.
pub fn identity_channel(initial: Option<Identity>) -> (IdentityPublisher, IdentityFeed) {
    let (sender, receiver) = watch::channel(initial);
    (IdentityPublisher { sender }, IdentityFeed { receiver })
}

#[derive(Debug)]
pub struct IdentityPublisher {
    sender: watch::Sender<Option<Identity>>,
}

impl IdentityPublisher {
    /// Publish the current identity, `None` when signed out.
    pub fn publish(&self, identity: Option<Identity>) {
        self.sender.send_replace(identity);
    }

    pub fn sign_in(&self, identity: Identity) {
        self.publish(Some(identity));
    }

    pub fn sign_out(&self) {
        self.publish(None);
    }

    /// Another feed on the same channel.
    pub fn subscribe(&self) -> IdentityFeed {
        IdentityFeed {
            receiver: self.sender.subscribe(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct IdentityFeed {
    receiver: watch::Receiver<Option<Identity>>,
}

impl IdentityFeed {
    /// Latest identity, marking it seen.
    pub fn current(&mut self) -> Option<Identity> {
        self.receiver.borrow_and_update().clone()
    }

    /// Wait for the next identity. `None` once the publisher is gone.
    pub async fn next(&mut self) -> Option<Option<Identity>> {
        match self.receiver.changed().await {
            Ok(()) => Some(self.current()),
            Err(_) => None,
        }
    }
}
