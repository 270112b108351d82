//! The login conversation state machine.
//!
//! Every inbound message that is not dispatched as an authenticated command
//! runs through [`step`], which owns all transitions between the
//! [`ConversationState`] variants. The machine mutates the row in place and
//! returns a [`Reply`]; persisting the row is the caller's job, so a failed
//! save can veto the whole delivery.

use chrono::{DateTime, Duration, Utc};
use tessera_core::{
  chat::{ChatIdentity, ConversationState},
  identity::{looks_like_email, normalize_email},
  store::DirectoryStore,
};

use crate::{
  auth::{self, CredentialCheck},
  code, dispatch,
};

/// How long a password window stays open after the email is accepted.
pub const CODE_TTL_MINUTES: i64 = 10;
/// How long a chat is refused after too many failed passwords.
pub const LOCKOUT_MINUTES: i64 = 10;
/// Failed passwords allowed inside one login before the lockout trips.
pub const MAX_PASSWORD_ATTEMPTS: u32 = 5;

// ─── Commands ────────────────────────────────────────────────────────────────

/// What an inbound message means to the machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
  /// `/start` or `login`: begin (or restart) a login conversation.
  Start,
  /// `/logout` or `logout`: sever the link, honored in every state.
  Logout,
  /// Anything else; its meaning depends on the current state.
  Payload(String),
}

impl Command {
  pub fn parse(text: &str) -> Self {
    let trimmed = text.trim();
    match trimmed.to_ascii_lowercase().as_str() {
      "/start" | "login" => Self::Start,
      "/logout" | "logout" => Self::Logout,
      _ => Self::Payload(trimmed.to_string()),
    }
  }
}

// ─── Replies ─────────────────────────────────────────────────────────────────

/// Everything the machine can say back to a chat.
///
/// A closed enum rather than bare strings, so tests match on outcomes and
/// the wording lives in exactly one place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
  PromptEmail,
  EmailRejected,
  PromptPassword,
  CodeExpired,
  PasswordRejected,
  LockedOut,
  Cooldown,
  LoggedIn { summary: String },
  LoggedOut,
  AlreadyLoggedIn,
  TransientFailure,
  /// Text produced by the authenticated command layer, passed through.
  Dispatch(String),
}

impl Reply {
  pub fn text(&self) -> String {
    match self {
      Self::PromptEmail => {
        "Please send the email address on your account to log in.".to_string()
      }
      Self::EmailRejected => {
        "We couldn't start a login with that address. Check it and try again."
          .to_string()
      }
      Self::PromptPassword => format!(
        "Now send your password. This login window closes in \
         {CODE_TTL_MINUTES} minutes."
      ),
      Self::CodeExpired => {
        "That login window has expired. Send `login` to start again."
          .to_string()
      }
      Self::PasswordRejected => {
        "That didn't match. Try again, or send `login` to restart.".to_string()
      }
      Self::LockedOut => format!(
        "Too many failed attempts. Login is locked for {LOCKOUT_MINUTES} \
         minutes."
      ),
      Self::Cooldown => {
        "Too many recent attempts. Wait a few minutes before trying again."
          .to_string()
      }
      Self::LoggedIn { summary } => format!("You're logged in.\n\n{summary}"),
      Self::LoggedOut => "You've been logged out.".to_string(),
      Self::AlreadyLoggedIn => {
        "You're already logged in. Send `help` for commands, or `logout` to \
         start over."
          .to_string()
      }
      Self::TransientFailure => {
        "Something went wrong on our side. Please try again shortly."
          .to_string()
      }
      Self::Dispatch(text) => text.clone(),
    }
  }
}

// ─── Transitions ─────────────────────────────────────────────────────────────

/// Advance one chat by one message.
///
/// Logout is honored before anything else, and a live lockout blanks every
/// other unauthenticated command. Infrastructure failures leave the row
/// exactly as it was; only a definitive credential rejection moves the
/// attempt counter.
pub async fn step<S>(
  store: &S,
  chat: &mut ChatIdentity,
  command: Command,
  now: DateTime<Utc>,
) -> Reply
where
  S: DirectoryStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  match (chat.state, command) {
    (_, Command::Logout) => {
      chat.unlink();
      Reply::LoggedOut
    }
    (_, _) if !chat.is_authenticated && chat.is_locked(now) => Reply::Cooldown,
    (
      ConversationState::Unauthenticated | ConversationState::WaitingForEmail,
      Command::Start,
    ) => {
      chat.state = ConversationState::WaitingForEmail;
      Reply::PromptEmail
    }
    (
      ConversationState::Unauthenticated | ConversationState::WaitingForEmail,
      Command::Payload(text),
    ) => {
      if looks_like_email(&text) {
        begin_login(store, chat, &text, now).await
      } else {
        chat.state = ConversationState::WaitingForEmail;
        Reply::PromptEmail
      }
    }
    (ConversationState::WaitingForPassword, Command::Start) => {
      // A restart abandons the open window rather than reusing it.
      chat.clear_login_state();
      chat.state = ConversationState::WaitingForEmail;
      Reply::PromptEmail
    }
    (ConversationState::WaitingForPassword, Command::Payload(password)) => {
      attempt_password(store, chat, &password, now).await
    }
    (ConversationState::Authenticated, _) => Reply::AlreadyLoggedIn,
  }
}

/// The claimed address shaped like an email: look it up and, if it exists,
/// open a one-time-code window for the password.
async fn begin_login<S>(
  store: &S,
  chat: &mut ChatIdentity,
  raw_email: &str,
  now: DateTime<Utc>,
) -> Reply
where
  S: DirectoryStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let email = normalize_email(raw_email);
  match auth::lookup_identity(store, &email).await {
    Ok(Some(_)) => {
      chat.pending_email = Some(email);
      chat.one_time_code = Some(code::generate());
      chat.code_expires_at = Some(now + Duration::minutes(CODE_TTL_MINUTES));
      chat.failed_attempts = 0;
      chat.state = ConversationState::WaitingForPassword;
      Reply::PromptPassword
    }
    Ok(None) => {
      chat.state = ConversationState::WaitingForEmail;
      Reply::EmailRejected
    }
    Err(e) => {
      tracing::warn!(error = %e, chat_id = chat.external_chat_id, "identity lookup failed");
      Reply::TransientFailure
    }
  }
}

async fn attempt_password<S>(
  store: &S,
  chat: &mut ChatIdentity,
  password: &str,
  now: DateTime<Utc>,
) -> Reply
where
  S: DirectoryStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  // Expiry is checked lazily at use, so a sweeper is a tidy-up rather than
  // a correctness requirement. The state is kept so the reply can say how
  // to start over.
  if chat.code_expired(now) {
    return Reply::CodeExpired;
  }
  let Some(email) = chat.pending_email.clone() else {
    // A code window without an email is a corrupt row; restart the login.
    chat.clear_login_state();
    chat.state = ConversationState::WaitingForEmail;
    return Reply::PromptEmail;
  };

  match auth::check_credentials(store, &email, password).await {
    CredentialCheck::Verified(identity) => {
      chat.identity_id = Some(identity.identity_id);
      chat.is_authenticated = true;
      chat.state = ConversationState::Authenticated;
      chat.clear_login_state();
      let summary = dispatch::login_summary(store, identity.identity_id).await;
      Reply::LoggedIn { summary }
    }
    CredentialCheck::Rejected => {
      chat.failed_attempts += 1;
      if chat.failed_attempts >= MAX_PASSWORD_ATTEMPTS {
        chat.clear_login_state();
        chat.state = ConversationState::Unauthenticated;
        chat.locked_until = Some(now + Duration::minutes(LOCKOUT_MINUTES));
        Reply::LockedOut
      } else {
        Reply::PasswordRejected
      }
    }
    CredentialCheck::Unavailable => Reply::TransientFailure,
  }
}
