//! Process-wide collection of registered extensions.

use crate::extension::{Capability, Extension};
use parking_lot::{Mutex, ReentrantMutex, RwLock};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// A change of the registered extension set.
#[derive(Debug, Clone)]
pub enum RegistryEvent {
  Added(Extension),
  Removed(Extension),
}

/// Token returned by [`ExtensionRegistry::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

type Observer = Arc<dyn Fn(&RegistryEvent) + Send + Sync>;

/// Maps extension ids to extensions and notifies observers on changes.
///
/// Observers are called synchronously before `register` and `deregister`
/// return, after the map lock has been released. Changes are serialized
/// together with their notifications, so every observer sees events in the
/// order the map changed. An observer may read the registry, but must not
/// block on another thread that mutates it.
#[derive(Default)]
pub struct ExtensionRegistry {
  extensions: RwLock<BTreeMap<String, Extension>>,
  /// Held from a mutation until its observers returned.
  changes: ReentrantMutex<()>,
  observers: Mutex<Vec<(SubscriptionId, Observer)>>,
  next_subscription: AtomicU64,
}

impl ExtensionRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Adds an extension.
  ///
  /// Returns `false` without notifying anyone if the id is empty or already
  /// registered.
  pub fn register(&self, extension: Extension) -> bool {
    if extension.id().is_empty() {
      warn!("Rejected extension with empty id");
      return false;
    }

    let _change = self.changes.lock();
    {
      let mut extensions = self.extensions.write();
      if extensions.contains_key(extension.id()) {
        warn!(extension = %extension.id(), "Extension already registered");
        return false;
      }
      extensions.insert(extension.id().to_string(), extension.clone());
    }

    debug!(extension = %extension.id(), capabilities = ?extension.capabilities(), "Extension registered");
    self.notify(&RegistryEvent::Added(extension));
    true
  }

  /// Removes the extension registered under `id`.
  ///
  /// Returns `false` if there was none.
  pub fn deregister(&self, id: &str) -> bool {
    let _change = self.changes.lock();
    let Some(extension) = self.extensions.write().remove(id) else {
      return false;
    };

    debug!(extension = %id, "Extension deregistered");
    self.notify(&RegistryEvent::Removed(extension));
    true
  }

  pub fn get(&self, id: &str) -> Option<Extension> {
    self.extensions.read().get(id).cloned()
  }

  /// Registered ids in ascending order.
  pub fn ids(&self) -> Vec<String> {
    self.extensions.read().keys().cloned().collect()
  }

  pub fn len(&self) -> usize {
    self.extensions.read().len()
  }

  pub fn is_empty(&self) -> bool {
    self.extensions.read().is_empty()
  }

  /// All extensions declaring `capability`, ordered by id.
  pub fn all_of(&self, capability: Capability) -> Vec<Extension> {
    self
      .extensions
      .read()
      .values()
      .filter(|extension| extension.has(capability))
      .cloned()
      .collect()
  }

  /// All registered extensions, ordered by id.
  pub fn all(&self) -> Vec<Extension> {
    self.extensions.read().values().cloned().collect()
  }

  /// Registers an observer for additions and removals.
  pub fn subscribe(&self, observer: impl Fn(&RegistryEvent) + Send + Sync + 'static) -> SubscriptionId {
    let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
    self.observers.lock().push((id, Arc::new(observer)));
    id
  }

  /// Removes an observer. Returns `false` if the token is unknown.
  pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
    let mut observers = self.observers.lock();
    let before = observers.len();
    observers.retain(|(subscription, _)| *subscription != id);
    observers.len() != before
  }

  fn notify(&self, event: &RegistryEvent) {
    let observers: Vec<Observer> = self.observers.lock().iter().map(|(_, o)| Arc::clone(o)).collect();
    for observer in observers {
      observer(event);
    }
  }
}

impl std::fmt::Debug for ExtensionRegistry {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ExtensionRegistry")
      .field("extensions", &self.ids())
      .field("observers", &self.observers.lock().len())
      .finish()
  }
}
