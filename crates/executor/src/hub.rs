//! Fans lifecycle updates out to the per-order WebSocket subscribers.
//! Messages for orders nobody is watching pile up in a per-order backlog
//! and are replayed, in order, to whoever attaches later. At most one
//! subscriber per order; a newer attach replaces the older one.

use {
    model::{Status, StatusMessage},
    std::{
        collections::HashMap,
        sync::Mutex,
    },
    tokio::sync::mpsc,
};

#[derive(Default)]
struct Entry {
    /// Token identifying the currently attached subscriber so a stale
    /// detach cannot tear down its replacement.
    subscriber: Option<(u64, mpsc::UnboundedSender<StatusMessage>)>,
    backlog: Vec<StatusMessage>,
}

/// Handle returned by [`Hub::attach`]. Receives every update for the order
/// from the moment of attaching, preceded by the drained backlog.
pub struct Subscription {
    pub receiver: mpsc::UnboundedReceiver<StatusMessage>,
    order_id: String,
    token: u64,
}

#[derive(Default)]
pub struct Hub {
    inner: Mutex<State>,
}

#[derive(Default)]
struct State {
    orders: HashMap<String, Entry>,
    next_token: u64,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a subscriber for the order, replacing any previous one.
    /// Buffered messages are handed over first, in their original order.
    pub fn attach(&self, order_id: &str) -> Subscription {
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock().unwrap();
        inner.next_token += 1;
        let token = inner.next_token;
        let entry = inner.orders.entry(order_id.to_string()).or_default();
        for message in entry.backlog.drain(..) {
            // The receiver is still in scope, the send cannot fail.
            let _ = sender.send(message);
        }
        entry.subscriber = Some((token, sender));
        Subscription {
            receiver,
            order_id: order_id.to_string(),
            token,
        }
    }

    /// Non-blocking delivery: straight to the subscriber when one is
    /// attached and writable, into the backlog otherwise. A dead channel
    /// demotes the subscriber to detached.
    pub fn send(&self, message: StatusMessage) {
        let mut inner = self.inner.lock().unwrap();
        let entry = inner.orders.entry(message.order_id.clone()).or_default();
        if let Some((_, subscriber)) = &entry.subscriber {
            match subscriber.send(message) {
                Ok(()) => return,
                Err(mpsc::error::SendError(message)) => {
                    entry.subscriber = None;
                    entry.backlog.push(message);
                }
            }
        } else {
            entry.backlog.push(message);
        }
    }

    pub fn send_status(
        &self,
        order_id: &str,
        status: Status,
        detail: Option<String>,
        link: Option<String>,
    ) {
        self.send(StatusMessage {
            order_id: order_id.to_string(),
            status,
            detail,
            link,
        });
    }

    /// Removes the subscription's registration. A subscription that was
    /// already replaced by a newer attach is a no-op.
    pub fn detach(&self, subscription: &Subscription) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(entry) = inner.orders.get_mut(&subscription.order_id) {
            if entry
                .subscriber
                .as_ref()
                .is_some_and(|(token, _)| *token == subscription.token)
            {
                entry.subscriber = None;
            }
        }
    }
}
