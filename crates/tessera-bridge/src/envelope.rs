//! Inbound webhook envelope.
//!
//! The chat platform wraps every delivery in an [`Update`]. Only message
//! updates carry conversational payload; other update kinds arrive with
//! `message` absent and are acknowledged without processing. Unknown JSON
//! fields are ignored so platform additions don't break the decode.

use serde::Deserialize;

/// One webhook delivery. `update_id` is the platform's monotonically
/// increasing delivery id, used for per-chat deduplication.
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
  pub update_id: i64,
  pub message:   Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
  pub message_id: i64,
  pub from:       Author,
  pub chat:       Chat,
  /// Absent for non-text messages (stickers, photos, joins).
  #[serde(default)]
  pub text:       Option<String>,
  /// Platform timestamp, seconds since the epoch.
  pub date:       i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Author {
  pub id:         i64,
  pub first_name: String,
  #[serde(default)]
  pub username:   Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
  pub id: i64,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn full_message_update_decodes() {
    let raw = r#"{
      "update_id": 7001,
      "message": {
        "message_id": 42,
        "from": {"id": 99, "first_name": "Bob", "username": "bobby"},
        "chat": {"id": 99},
        "text": "login",
        "date": 1700000000
      }
    }"#;
    let update: Update = serde_json::from_str(raw).unwrap();
    assert_eq!(update.update_id, 7001);
    let message = update.message.unwrap();
    assert_eq!(message.chat.id, 99);
    assert_eq!(message.from.username.as_deref(), Some("bobby"));
    assert_eq!(message.text.as_deref(), Some("login"));
  }

  #[test]
  fn non_message_update_decodes_with_none() {
    let update: Update = serde_json::from_str(r#"{"update_id": 7002}"#).unwrap();
    assert!(update.message.is_none());
  }

  #[test]
  fn textless_message_decodes() {
    let raw = r#"{
      "update_id": 7003,
      "message": {
        "message_id": 43,
        "from": {"id": 99, "first_name": "Bob"},
        "chat": {"id": 99},
        "date": 1700000001
      }
    }"#;
    let update: Update = serde_json::from_str(raw).unwrap();
    let message = update.message.unwrap();
    assert!(message.text.is_none());
    assert!(message.from.username.is_none());
  }
}
