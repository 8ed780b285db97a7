//! Change notification hub for the mirror store.

use tokio::sync::broadcast;

/// The four mirrored collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Inventory,
    Invoices,
    Payments,
    Transactions,
}

impl Collection {
    pub fn key(&self) -> &'static str {
        match self {
            Collection::Inventory => "inventory",
            Collection::Invoices => "invoices",
            Collection::Payments => "payments",
            Collection::Transactions => "transactions",
        }
    }
}

/// Published after each mutation. Subscribers re-read the collection through
/// the store's accessors rather than receiving a copy of the data.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub collection: Collection,
    pub revision: u64,
}

/// Broadcast-based pub/sub. Publishing is synchronous and never blocks; a
/// send with no live subscribers is not an error.
#[derive(Debug)]
pub struct ChangeHub {
    sender: broadcast::Sender<ChangeEvent>,
    revision: u64,
}

impl ChangeHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender, revision: 0 }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.sender.subscribe()
    }

    pub(crate) fn publish(&mut self, collection: Collection) {
        self.revision += 1;
        let _ = self.sender.send(ChangeEvent {
            collection,
            revision: self.revision,
        });
    }
}

impl Default for ChangeHub {
    fn default() -> Self {
        Self::new(64)
    }
}
