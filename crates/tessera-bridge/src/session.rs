//! Per-chat serialization and delivery deduplication.
//!
//! Webhook platforms redeliver: the same update can arrive twice, and two
//! updates for one chat can arrive concurrently. Each chat gets a gate, an
//! async mutex guarding a bounded window of recently seen update ids. The
//! handler locks the gate for the whole of one delivery, so transitions for
//! a single chat are strictly ordered while distinct chats proceed in
//! parallel.

use std::{
  collections::{HashMap, VecDeque},
  sync::{Arc, Mutex as StdMutex, PoisonError},
};

use tokio::sync::Mutex;

/// How many update ids each chat's window remembers.
const DEDUP_WINDOW: usize = 64;

/// Recently seen delivery ids for one chat, oldest first.
#[derive(Debug, Default)]
pub struct DeliveryWindow {
  seen: VecDeque<i64>,
}

impl DeliveryWindow {
  /// Record `update_id`; returns `false` if it was already in the window,
  /// in which case the delivery must be acknowledged without processing.
  pub fn first_delivery(&mut self, update_id: i64) -> bool {
    if self.seen.contains(&update_id) {
      return false;
    }
    if self.seen.len() == DEDUP_WINDOW {
      self.seen.pop_front();
    }
    self.seen.push_back(update_id);
    true
  }
}

/// Shared map of chat id → gate. Gates are created on first contact and
/// kept for the life of the process; the population is bounded by the
/// number of distinct chats.
#[derive(Debug, Default)]
pub struct SessionMap {
  gates: StdMutex<HashMap<i64, Arc<Mutex<DeliveryWindow>>>>,
}

impl SessionMap {
  pub fn new() -> Self {
    Self::default()
  }

  /// The gate for `chat_id`, creating it if this is first contact.
  pub fn gate(&self, chat_id: i64) -> Arc<Mutex<DeliveryWindow>> {
    let mut gates = self.gates.lock().unwrap_or_else(PoisonError::into_inner);
    gates.entry(chat_id).or_default().clone()
  }
}
