//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings (which sort
//! chronologically, so SQL can compare them directly). Enum discriminants
//! are stored as their lowercase serde strings. UUIDs are stored as
//! hyphenated lowercase strings.

use chrono::{DateTime, Utc};
use tessera_core::{
  chat::{ChatIdentity, ConversationState},
  identity::Identity,
  profile::{Profile, ProfileKind, ProfileStatus},
  role::{PermissionEntry, Role},
  tenant::Tenant,
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

fn decode_opt_dt(s: Option<&str>) -> Result<Option<DateTime<Utc>>> {
  s.map(decode_dt).transpose()
}

// ─── Discriminants ───────────────────────────────────────────────────────────

pub fn decode_profile_kind(s: &str) -> Result<ProfileKind> {
  match s {
    "owner" => Ok(ProfileKind::Owner),
    "employee" => Ok(ProfileKind::Employee),
    "customer" => Ok(ProfileKind::Customer),
    other => {
      Err(Error::UnknownDiscriminant(format!("profile kind: {other:?}")))
    }
  }
}

pub fn decode_profile_status(s: &str) -> Result<ProfileStatus> {
  match s {
    "pending" => Ok(ProfileStatus::Pending),
    "active" => Ok(ProfileStatus::Active),
    "suspended" => Ok(ProfileStatus::Suspended),
    other => {
      Err(Error::UnknownDiscriminant(format!("profile status: {other:?}")))
    }
  }
}

pub fn decode_conversation_state(s: &str) -> Result<ConversationState> {
  match s {
    "unauthenticated" => Ok(ConversationState::Unauthenticated),
    "waiting_for_email" => Ok(ConversationState::WaitingForEmail),
    "waiting_for_password" => Ok(ConversationState::WaitingForPassword),
    "authenticated" => Ok(ConversationState::Authenticated),
    other => {
      Err(Error::UnknownDiscriminant(format!("conversation state: {other:?}")))
    }
  }
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from an `identities` row.
pub struct RawIdentity {
  pub identity_id:   String,
  pub email:         String,
  pub display_name:  String,
  pub password_hash: String,
  pub created_at:    String,
}

impl RawIdentity {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      identity_id:   row.get(0)?,
      email:         row.get(1)?,
      display_name:  row.get(2)?,
      password_hash: row.get(3)?,
      created_at:    row.get(4)?,
    })
  }

  pub fn into_identity(self) -> Result<Identity> {
    Ok(Identity {
      identity_id:   decode_uuid(&self.identity_id)?,
      email:         self.email,
      display_name:  self.display_name,
      password_hash: self.password_hash,
      created_at:    decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read directly from a `tenants` row.
pub struct RawTenant {
  pub tenant_id:         String,
  pub name:              String,
  pub slug:              String,
  pub owner_identity_id: String,
  pub created_at:        String,
}

impl RawTenant {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      tenant_id:         row.get(0)?,
      name:              row.get(1)?,
      slug:              row.get(2)?,
      owner_identity_id: row.get(3)?,
      created_at:        row.get(4)?,
    })
  }

  pub fn into_tenant(self) -> Result<Tenant> {
    Ok(Tenant {
      tenant_id:         decode_uuid(&self.tenant_id)?,
      name:              self.name,
      slug:              self.slug,
      owner_identity_id: decode_uuid(&self.owner_identity_id)?,
      created_at:        decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read directly from a `profiles` row.
pub struct RawProfile {
  pub profile_id:   String,
  pub identity_id:  String,
  pub tenant_id:    String,
  pub kind:         String,
  pub is_primary:   bool,
  pub status:       String,
  pub created_at:   String,
  pub activated_at: Option<String>,
}

impl RawProfile {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      profile_id:   row.get(0)?,
      identity_id:  row.get(1)?,
      tenant_id:    row.get(2)?,
      kind:         row.get(3)?,
      is_primary:   row.get(4)?,
      status:       row.get(5)?,
      created_at:   row.get(6)?,
      activated_at: row.get(7)?,
    })
  }

  pub fn into_profile(self) -> Result<Profile> {
    Ok(Profile {
      profile_id:   decode_uuid(&self.profile_id)?,
      identity_id:  decode_uuid(&self.identity_id)?,
      tenant_id:    decode_uuid(&self.tenant_id)?,
      kind:         decode_profile_kind(&self.kind)?,
      is_primary:   self.is_primary,
      status:       decode_profile_status(&self.status)?,
      created_at:   decode_dt(&self.created_at)?,
      activated_at: decode_opt_dt(self.activated_at.as_deref())?,
    })
  }
}

/// Raw strings read directly from a `roles` row.
pub struct RawRole {
  pub role_id:    String,
  pub tenant_id:  String,
  pub name:       String,
  pub slug:       String,
  pub is_system:  bool,
  pub created_at: String,
}

impl RawRole {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      role_id:    row.get(0)?,
      tenant_id:  row.get(1)?,
      name:       row.get(2)?,
      slug:       row.get(3)?,
      is_system:  row.get(4)?,
      created_at: row.get(5)?,
    })
  }

  pub fn into_role(self) -> Result<Role> {
    Ok(Role {
      role_id:    decode_uuid(&self.role_id)?,
      tenant_id:  decode_uuid(&self.tenant_id)?,
      name:       self.name,
      slug:       self.slug,
      is_system:  self.is_system,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read directly from a `permissions` row.
pub struct RawPermission {
  pub permission_id: String,
  pub tenant_id:     String,
  pub resource:      String,
  pub action:        String,
}

impl RawPermission {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      permission_id: row.get(0)?,
      tenant_id:     row.get(1)?,
      resource:      row.get(2)?,
      action:        row.get(3)?,
    })
  }

  pub fn into_permission(self) -> Result<PermissionEntry> {
    Ok(PermissionEntry {
      permission_id: decode_uuid(&self.permission_id)?,
      tenant_id:     decode_uuid(&self.tenant_id)?,
      resource:      self.resource,
      action:        self.action,
    })
  }
}

/// Raw values read directly from a `chat_identities` row.
pub struct RawChatIdentity {
  pub external_chat_id:  i64,
  pub external_username: Option<String>,
  pub identity_id:       Option<String>,
  pub state:             String,
  pub pending_email:     Option<String>,
  pub one_time_code:     Option<String>,
  pub code_expires_at:   Option<String>,
  pub failed_attempts:   u32,
  pub locked_until:      Option<String>,
  pub is_authenticated:  bool,
  pub last_activity_at:  String,
  pub created_at:        String,
}

impl RawChatIdentity {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      external_chat_id:  row.get(0)?,
      external_username: row.get(1)?,
      identity_id:       row.get(2)?,
      state:             row.get(3)?,
      pending_email:     row.get(4)?,
      one_time_code:     row.get(5)?,
      code_expires_at:   row.get(6)?,
      failed_attempts:   row.get(7)?,
      locked_until:      row.get(8)?,
      is_authenticated:  row.get(9)?,
      last_activity_at:  row.get(10)?,
      created_at:        row.get(11)?,
    })
  }

  pub fn into_chat_identity(self) -> Result<ChatIdentity> {
    Ok(ChatIdentity {
      external_chat_id:  self.external_chat_id,
      external_username: self.external_username,
      identity_id:       self
        .identity_id
        .as_deref()
        .map(decode_uuid)
        .transpose()?,
      state:             decode_conversation_state(&self.state)?,
      pending_email:     self.pending_email,
      one_time_code:     self.one_time_code,
      code_expires_at:   decode_opt_dt(self.code_expires_at.as_deref())?,
      failed_attempts:   self.failed_attempts,
      locked_until:      decode_opt_dt(self.locked_until.as_deref())?,
      is_authenticated:  self.is_authenticated,
      last_activity_at:  decode_dt(&self.last_activity_at)?,
      created_at:        decode_dt(&self.created_at)?,
    })
  }
}
