//! Chat-side identity linkage and the authentication conversation state.
//!
//! A chat identity is keyed by the messaging platform's numeric chat id and
//! optionally linked to a directory identity once the user has proven who
//! they are. The conversation state is a closed enum; every transition the
//! bridge performs is a match over these variants, so an unhandled state is
//! a compile error rather than a stuck conversation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Where a chat stands in the login conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationState {
  /// No login in progress.
  Unauthenticated,
  /// The bridge asked for an email address.
  WaitingForEmail,
  /// Email accepted; a one-time code window is open for the password.
  WaitingForPassword,
  /// Linked to an identity; commands are dispatched with a resolved context.
  Authenticated,
}

impl ConversationState {
  /// The discriminant string stored in the `state` column.
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Unauthenticated => "unauthenticated",
      Self::WaitingForEmail => "waiting_for_email",
      Self::WaitingForPassword => "waiting_for_password",
      Self::Authenticated => "authenticated",
    }
  }
}

/// One chat conversation's identity linkage and login progress.
///
/// `external_chat_id` is the platform's id, not ours, so the row survives
/// restarts and re-registrations of the bot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatIdentity {
  pub external_chat_id:  i64,
  pub external_username: Option<String>,
  /// Present once a login has completed; cleared on logout or unlink.
  pub identity_id:       Option<Uuid>,
  pub state:             ConversationState,
  /// The email claimed mid-login, held until the password check settles.
  pub pending_email:     Option<String>,
  /// Random hex token minted when the email is accepted. It binds the
  /// password attempt to a single login window; it is never shown to the
  /// user and never accepted as input.
  #[serde(skip_serializing, default)]
  pub one_time_code:     Option<String>,
  pub code_expires_at:   Option<DateTime<Utc>>,
  pub failed_attempts:   u32,
  /// While set and in the future, every login attempt is refused.
  pub locked_until:      Option<DateTime<Utc>>,
  pub is_authenticated:  bool,
  pub last_activity_at:  DateTime<Utc>,
  pub created_at:        DateTime<Utc>,
}

impl ChatIdentity {
  /// A fresh, unauthenticated row for a chat seen for the first time.
  pub fn new(
    external_chat_id: i64,
    external_username: Option<String>,
    now: DateTime<Utc>,
  ) -> Self {
    Self {
      external_chat_id,
      external_username,
      identity_id: None,
      state: ConversationState::Unauthenticated,
      pending_email: None,
      one_time_code: None,
      code_expires_at: None,
      failed_attempts: 0,
      locked_until: None,
      is_authenticated: false,
      last_activity_at: now,
      created_at: now,
    }
  }

  /// Drop all in-flight login material. Linkage and lockout are untouched.
  pub fn clear_login_state(&mut self) {
    self.pending_email = None;
    self.one_time_code = None;
    self.code_expires_at = None;
    self.failed_attempts = 0;
  }

  /// Sever the link to a directory identity and return to the idle state.
  pub fn unlink(&mut self) {
    self.identity_id = None;
    self.is_authenticated = false;
    self.state = ConversationState::Unauthenticated;
    self.clear_login_state();
  }

  /// Whether a lockout is still in force at `now`.
  pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
    self.locked_until.is_some_and(|until| until > now)
  }

  /// Whether the open code window (if any) has lapsed at `now`.
  pub fn code_expired(&self, now: DateTime<Utc>) -> bool {
    self.code_expires_at.is_none_or(|at| at <= now)
  }
}

#[cfg(test)]
mod tests {
  use chrono::Duration;

  use super::*;

  #[test]
  fn unlink_resets_everything_but_lockout() {
    let now = Utc::now();
    let mut chat = ChatIdentity::new(42, Some("bob".into()), now);
    chat.identity_id = Some(Uuid::new_v4());
    chat.is_authenticated = true;
    chat.state = ConversationState::Authenticated;
    chat.pending_email = Some("bob@example.com".into());
    chat.one_time_code = Some("deadbeef".into());
    chat.code_expires_at = Some(now + Duration::minutes(10));
    chat.failed_attempts = 3;
    chat.locked_until = Some(now + Duration::minutes(5));

    chat.unlink();

    assert_eq!(chat.identity_id, None);
    assert!(!chat.is_authenticated);
    assert_eq!(chat.state, ConversationState::Unauthenticated);
    assert_eq!(chat.pending_email, None);
    assert_eq!(chat.one_time_code, None);
    assert_eq!(chat.failed_attempts, 0);
    // Lockout survives; logging out is not a way to dodge it.
    assert!(chat.is_locked(now));
  }

  #[test]
  fn code_window_expiry() {
    let now = Utc::now();
    let mut chat = ChatIdentity::new(1, None, now);
    assert!(chat.code_expired(now));

    chat.code_expires_at = Some(now + Duration::minutes(10));
    assert!(!chat.code_expired(now));
    assert!(chat.code_expired(now + Duration::minutes(11)));
    assert!(chat.code_expired(now + Duration::minutes(10)));
  }

  #[test]
  fn lockout_window() {
    let now = Utc::now();
    let mut chat = ChatIdentity::new(1, None, now);
    assert!(!chat.is_locked(now));

    chat.locked_until = Some(now + Duration::minutes(10));
    assert!(chat.is_locked(now));
    assert!(!chat.is_locked(now + Duration::minutes(10)));
  }
}
