//! Key-path store.
//!
//! The store mirrors the authority's state locally and fans out change
//! notifications to pattern subscribers. Writes are requests: `set` hands
//! the value to the transport and the mirror only changes once the
//! authority echoes the change back through [`KeyPathStore::apply`].

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::error::{KeyPathError, TransportError};
use crate::keypath::KeyPattern;
use crate::model::{display_value, Request};

/// Boundary to whatever physically carries requests to the authority.
pub trait Transport {
    /// Ask the transport to open its session. Calling it again while a
    /// session is open or pending must be harmless.
    fn connect(&mut self) -> Result<(), TransportError>;

    /// Hand a request to the transport. Fire-and-forget: no acknowledgement.
    fn send(&mut self, request: Request) -> Result<(), TransportError>;
}

/// Callback invoked with `(key, value)` for every matching notification.
pub type Callback = Box<dyn FnMut(&str, &Value)>;

/// Handle returned by [`KeyPathStore::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

struct Subscription {
    id: SubscriptionId,
    patterns: Vec<KeyPattern>,
    callback: Callback,
}

impl Subscription {
    fn matches(&self, key: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(key))
    }
}

/// Local mirror of the authority's key/value state.
pub struct KeyPathStore {
    /// Last known value per key. `Null` means cleared, absence means unseen.
    state: BTreeMap<String, Value>,
    /// Active subscriptions in registration order.
    subscriptions: Vec<Subscription>,
    transport: Box<dyn Transport>,
    connected: bool,
    next_id: u64,
}

impl KeyPathStore {
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self {
            state: BTreeMap::new(),
            subscriptions: Vec::new(),
            transport,
            connected: false,
            next_id: 1,
        }
    }

    /// Subscribe `callback` to one or more patterns.
    ///
    /// Every key already in the mirror that matches is replayed to the
    /// callback before this returns. While connected the patterns are also
    /// registered with the authority; otherwise they wait for
    /// [`auto_register`](Self::auto_register).
    pub fn register<I, S, F>(&mut self, patterns: I, mut callback: F) -> Result<SubscriptionId, KeyPathError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        F: FnMut(&str, &Value) + 'static,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| KeyPattern::new(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;

        let id = SubscriptionId(self.next_id);
        self.next_id += 1;

        for (key, value) in &self.state {
            if patterns.iter().any(|p| p.matches(key)) {
                callback(key.as_str(), value);
            }
        }

        if self.connected {
            let paths = patterns.iter().map(|p| p.as_str().to_string()).collect();
            self.send(Request::Register(paths));
        } else {
            debug!("Queued registration of {} pattern(s) until connected", patterns.len());
        }

        self.subscriptions.push(Subscription {
            id,
            patterns,
            callback: Box::new(callback),
        });

        Ok(id)
    }

    /// Drop a subscription. The authority keeps sending the keys; they are
    /// simply no longer delivered to this callback.
    pub fn unregister(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|s| s.id != id);
        before != self.subscriptions.len()
    }

    /// Ask the authority to adopt `value` for `key`. `Null` clears the key.
    ///
    /// The local mirror is not touched.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        let value = value.into();
        debug!("Set {} = {:?}", key, display_value(&value));
        self.send(Request::Set {
            key: key.to_string(),
            value,
        });
    }

    /// Open the session with the authority. No-op when already connected.
    pub fn connect(&mut self) {
        if self.connected {
            return;
        }
        if let Err(e) = self.transport.connect() {
            warn!("Failed to request connection: {}", e);
        }
    }

    /// Re-issue every registered pattern, e.g. after a reconnect.
    pub fn auto_register(&mut self) {
        let mut paths: Vec<String> = Vec::new();
        for pattern in self.subscriptions.iter().flat_map(|s| &s.patterns) {
            if !paths.iter().any(|p| p == pattern.as_str()) {
                paths.push(pattern.as_str().to_string());
            }
        }

        if paths.is_empty() {
            return;
        }
        debug!("Re-registering {} pattern(s)", paths.len());
        self.send(Request::Register(paths));
    }

    /// Called by the session driver once the authority is reachable.
    pub fn mark_connected(&mut self) {
        self.connected = true;
    }

    /// Called by the session driver when the session drops.
    pub fn mark_disconnected(&mut self) {
        self.connected = false;
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Apply one change notification from the authority.
    ///
    /// The mirror is updated first, then every matching subscriber runs in
    /// registration order. Re-delivery of an unchanged value is delivered
    /// again.
    pub fn apply(&mut self, key: &str, value: Value) {
        trace!("Notify {} = {:?}", key, value);
        self.state.insert(key.to_string(), value.clone());

        for sub in self.subscriptions.iter_mut() {
            if sub.matches(key) {
                (sub.callback)(key, &value);
            }
        }
    }

    /// Apply a batch of notifications in the order given.
    pub fn apply_state<I>(&mut self, changes: I)
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        for (key, value) in changes {
            self.apply(&key, value);
        }
    }

    /// Last known value for `key`. `Some(&Value::Null)` means cleared.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.state.get(key)
    }

    /// Last known value for `key` if it is a string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.state.get(key).and_then(Value::as_str)
    }

    /// Whether the key has ever been observed (cleared keys included).
    pub fn contains(&self, key: &str) -> bool {
        self.state.contains_key(key)
    }

    /// The full mirror.
    pub fn snapshot(&self) -> &BTreeMap<String, Value> {
        &self.state
    }

    /// Number of keys in the mirror.
    pub fn len(&self) -> usize {
        self.state.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.is_empty()
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    fn send(&mut self, request: Request) {
        if let Err(e) = self.transport.send(request) {
            warn!("Transport rejected request: {}", e);
        }
    }
}

/// In-memory transport that records every request.
///
/// Useful for driving the engine without an authority: feed notifications
/// with [`KeyPathStore::apply`] and inspect what would have been sent.
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    log: Rc<RefCell<Vec<Request>>>,
    connects: Rc<RefCell<usize>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests sent so far.
    pub fn requests(&self) -> Vec<Request> {
        self.log.borrow().clone()
    }

    /// Drain the recorded requests.
    pub fn take(&self) -> Vec<Request> {
        self.log.borrow_mut().drain(..).collect()
    }

    /// Number of connection requests received.
    pub fn connect_count(&self) -> usize {
        *self.connects.borrow()
    }
}

impl Transport for MemoryTransport {
    fn connect(&mut self) -> Result<(), TransportError> {
        *self.connects.borrow_mut() += 1;
        Ok(())
    }

    fn send(&mut self, request: Request) -> Result<(), TransportError> {
        self.log.borrow_mut().push(request);
        Ok(())
    }
}
