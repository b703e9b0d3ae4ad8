//! Address-pattern dispatch
//!
//! Listeners register under a pattern (see [`crate::address::Pattern`]).
//! Every decoded message goes to every listener whose pattern matches;
//! there is no first-match-wins and no ordering between listeners.
//!
//! Bundle timetags are passed through to listeners but never scheduled on:
//! children are delivered as soon as the packet is dispatched.

use std::borrow::Cow;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::address::Pattern;
use crate::codec::{self, DecodeOptions};
use crate::packet::{Message, Packet};
use crate::shortcut::{self, ShortcutTable};
use crate::time::TimeTag;
use crate::{Error, Result};

/// Handle returned by [`Dispatcher::add_listener`]
pub type ListenerId = u64;

/// Receives dispatched messages.
///
/// `time` is the enclosing bundle's timetag, or `None` for a bare message.
pub trait Listener: Send + Sync {
    fn accept(&self, time: Option<TimeTag>, message: &Message);
}

impl<F> Listener for F
where
    F: Fn(Option<TimeTag>, &Message) + Send + Sync,
{
    fn accept(&self, time: Option<TimeTag>, message: &Message) {
        self(time, message)
    }
}

/// What to do with a `/@` message whose id is not registered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShortcutMiss {
    /// Deliver the `/@` message unexpanded
    #[default]
    PassThrough,
    /// Drop it
    Reject,
}

struct Registration {
    pattern: Pattern,
    listener: Arc<dyn Listener>,
}

/// Routes packets to listeners
pub struct Dispatcher {
    listeners: DashMap<ListenerId, Registration>,
    next_id: AtomicU64,
    shortcuts: Arc<ShortcutTable>,
    shortcut_miss: ShortcutMiss,
    decode: DecodeOptions,
}

impl Dispatcher {
    /// A dispatcher with an empty shortcut table
    pub fn new() -> Self {
        Self::with_shortcuts(Arc::new(ShortcutTable::new()))
    }

    pub fn with_shortcuts(shortcuts: Arc<ShortcutTable>) -> Self {
        Self {
            listeners: DashMap::new(),
            next_id: AtomicU64::new(1),
            shortcuts,
            shortcut_miss: ShortcutMiss::default(),
            decode: DecodeOptions::default(),
        }
    }

    pub fn shortcut_miss(mut self, policy: ShortcutMiss) -> Self {
        self.shortcut_miss = policy;
        self
    }

    pub fn decode_options(mut self, opts: DecodeOptions) -> Self {
        self.decode = opts;
        self
    }

    pub fn shortcuts(&self) -> &Arc<ShortcutTable> {
        &self.shortcuts
    }

    /// Register a listener under an address pattern
    pub fn add_listener(
        &self,
        pattern: &str,
        listener: impl Listener + 'static,
    ) -> Result<ListenerId> {
        let pattern = Pattern::compile(pattern)?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!("Listener {} registered for {}", id, pattern);

        self.listeners.insert(
            id,
            Registration {
                pattern,
                listener: Arc::new(listener),
            },
        );
        Ok(id)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Decode a datagram and dispatch it
    pub fn dispatch_bytes(&self, bytes: &[u8], source: SocketAddr) -> Result<usize> {
        let packet = codec::decode_from(bytes, source, &self.decode)?;
        Ok(self.dispatch(&packet))
    }

    /// Deliver a packet, returning the number of listener calls made
    ///
    /// Bundles nested deeper than the decode options allow are skipped.
    pub fn dispatch(&self, packet: &Packet) -> usize {
        self.dispatch_packet(packet, None, 0)
    }

    fn dispatch_packet(&self, packet: &Packet, time: Option<TimeTag>, depth: usize) -> usize {
        if depth > self.decode.max_depth {
            warn!("Bundle nesting deeper than {}, skipping", self.decode.max_depth);
            return 0;
        }
        match packet {
            Packet::Message(msg) => self.dispatch_message(msg, time),
            Packet::Bundle(bundle) => {
                let time = Some(bundle.timetag());
                bundle
                    .packets()
                    .iter()
                    .map(|child| self.dispatch_packet(child, time, depth + 1))
                    .sum()
            }
        }
    }

    fn dispatch_message(&self, msg: &Message, time: Option<TimeTag>) -> usize {
        let msg = match self.expand(msg) {
            Some(m) => m,
            None => return 0,
        };

        // Collect first so listeners may (un)register without deadlocking
        let targets: Vec<Arc<dyn Listener>> = self
            .listeners
            .iter()
            .filter(|entry| entry.value().pattern.matches(msg.address()))
            .map(|entry| Arc::clone(&entry.value().listener))
            .collect();

        for listener in &targets {
            listener.accept(time, &msg);
        }

        debug!("Dispatched {} to {} listeners", msg.address(), targets.len());
        targets.len()
    }

    /// Expand a `/@` message. `None` means drop.
    fn expand<'a>(&self, msg: &'a Message) -> Option<Cow<'a, Message>> {
        if !shortcut::is_compressed(msg) {
            return Some(Cow::Borrowed(msg));
        }

        let opts = DecodeOptions {
            charset: msg.charset(),
            ..self.decode
        };
        match self.shortcuts.expand(msg, &opts) {
            Ok(Some(expanded)) => Some(Cow::Owned(expanded)),
            Ok(None) => Some(Cow::Borrowed(msg)),
            Err(e) => {
                let action = match self.shortcut_miss {
                    ShortcutMiss::PassThrough => "passing through",
                    ShortcutMiss::Reject => "dropping",
                };
                match &e {
                    Error::UnknownShortcut(id) => warn!("Unknown shortcut id {}, {}", id, action),
                    other => warn!("Failed to expand shortcut message: {}, {}", other, action),
                }
                match self.shortcut_miss {
                    ShortcutMiss::PassThrough => Some(Cow::Borrowed(msg)),
                    ShortcutMiss::Reject => None,
                }
            }
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("listeners", &self.listeners.len())
            .field("shortcuts", &self.shortcuts.len())
            .field("shortcut_miss", &self.shortcut_miss)
            .finish()
    }
}
