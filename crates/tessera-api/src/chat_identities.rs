//! Handlers for chat-to-identity links.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/chat-identities` | Every chat the bridge has seen |
//! | `POST` | `/chat-identities/{chat_id}/unlink` | Force a chat back to logged-out |
//!
//! Unlink is how an operator revokes a lost phone: the chat keeps its
//! conversation row (and any running lockout) but loses the identity link,
//! so the next message is treated as a stranger's.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
};
use tessera_core::{chat::ChatIdentity, store::DirectoryStore};

use crate::{auth::Acting, error::ApiError};

/// `GET /chat-identities`
pub async fn list<S>(
  State(store): State<Arc<S>>,
  Acting(_): Acting,
) -> Result<Json<Vec<ChatIdentity>>, ApiError>
where
  S: DirectoryStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let chats = store
    .list_chat_identities()
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(chats))
}

/// `POST /chat-identities/{chat_id}/unlink`
///
/// Allowed for the linked identity itself, or for anyone who owns a
/// tenant. Returns the cleared row.
pub async fn unlink<S>(
  State(store): State<Arc<S>>,
  Acting(acting): Acting,
  Path(chat_id): Path<i64>,
) -> Result<Json<ChatIdentity>, ApiError>
where
  S: DirectoryStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let mut chat = store
    .get_chat_identity(chat_id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::NotFound(format!("chat {chat_id} not found")))?;

  let is_linked_self = chat.identity_id == Some(acting.identity_id);
  if !is_linked_self {
    let tenants =
      store.list_tenants().await.map_err(ApiError::from_store)?;
    let owns_a_tenant = tenants
      .iter()
      .any(|t| t.owner_identity_id == acting.identity_id);
    if !owns_a_tenant {
      return Err(ApiError::Forbidden(
        "unlinking another identity's chat requires tenant ownership".into(),
      ));
    }
  }

  chat.unlink();
  store
    .save_chat_identity(&chat)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(chat))
}
