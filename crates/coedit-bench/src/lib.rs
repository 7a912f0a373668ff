//! Shared fixtures for the Coedit benchmarks.

use coedit_core::{Identity, Inbox, Outbox, SessionRegistry};

/// A connected participant as the benchmarks see it.
pub struct Viewer {
    pub identity: Identity,
    pub outbox: Outbox,
    pub inbox: Inbox,
}

impl Viewer {
    /// Create a viewer with a fresh delivery queue.
    #[must_use]
    pub fn new(index: usize) -> Self {
        let identity = Identity::new(format!("user-{index}"), format!("User {index}"));
        let (outbox, inbox) = Outbox::channel(format!("conn-{index}"));
        Self {
            identity,
            outbox,
            inbox,
        }
    }

    /// Join `document_id` through this viewer's queue.
    pub fn join(&self, registry: &SessionRegistry, document_id: &str) {
        registry.join(document_id, &self.identity, self.outbox.clone());
    }

    /// Discard everything queued so far, returning how many events there were.
    pub fn drain(&mut self) -> usize {
        let mut count = 0;
        while self.inbox.try_recv().is_ok() {
            count += 1;
        }
        count
    }
}

/// Build a registry with `members` viewers in one document.
#[must_use]
pub fn populated_room(document_id: &str, members: usize) -> (SessionRegistry, Vec<Viewer>) {
    let registry = SessionRegistry::default();
    let mut viewers: Vec<Viewer> = Vec::with_capacity(members);
    for index in 0..members {
        viewers.push(Viewer::new(index));
        viewers[index].join(&registry, document_id);
        // Keep every queue well under its capacity while the room fills up
        for viewer in &mut viewers {
            viewer.drain();
        }
    }
    (registry, viewers)
}
