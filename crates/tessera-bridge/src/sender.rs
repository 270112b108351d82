//! Outbound reply delivery.

use std::{future::Future, time::Duration};

use serde::Serialize;

use crate::error::Error;

/// Transport for replies back into the chat platform.
///
/// Implementations absorb their own failures: by the time a reply goes out
/// the conversation state is already persisted, so a lost reply costs a
/// re-prompt, not a stuck login.
pub trait ChatSender: Send + Sync {
  fn send<'a>(
    &'a self,
    chat_id: i64,
    text: &'a str,
  ) -> impl Future<Output = ()> + Send + 'a;
}

#[derive(Serialize)]
struct OutgoingMessage<'a> {
  chat_id: i64,
  text:    &'a str,
}

const SEND_ATTEMPTS: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_millis(250);

/// Sends replies through the platform's HTTP API with bounded retries.
#[derive(Clone)]
pub struct HttpSender {
  client: reqwest::Client,
  url:    String,
}

impl HttpSender {
  pub fn new(api_base: &str, token: &str) -> Result<Self, Error> {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(10))
      .build()?;
    let url =
      format!("{}/bot{}/sendMessage", api_base.trim_end_matches('/'), token);
    Ok(Self { client, url })
  }
}

impl ChatSender for HttpSender {
  async fn send(&self, chat_id: i64, text: &str) {
    let payload = OutgoingMessage { chat_id, text };
    for attempt in 1..=SEND_ATTEMPTS {
      match self.client.post(&self.url).json(&payload).send().await {
        Ok(resp) if resp.status().is_success() => return,
        Ok(resp) => {
          tracing::warn!(chat_id, attempt, status = %resp.status(), "send rejected");
        }
        Err(e) => {
          tracing::warn!(chat_id, attempt, error = %e, "send failed");
        }
      }
      if attempt < SEND_ATTEMPTS {
        tokio::time::sleep(RETRY_DELAY).await;
      }
    }
    tracing::error!(chat_id, "dropping reply after {SEND_ATTEMPTS} attempts");
  }
}

/// Captures outbound traffic instead of sending it.
#[cfg(test)]
#[derive(Clone, Default)]
pub struct RecordingSender {
  sent: std::sync::Arc<std::sync::Mutex<Vec<(i64, String)>>>,
}

#[cfg(test)]
impl RecordingSender {
  pub fn sent(&self) -> Vec<(i64, String)> {
    self.sent.lock().unwrap().clone()
  }
}

#[cfg(test)]
impl ChatSender for RecordingSender {
  async fn send(&self, chat_id: i64, text: &str) {
    self.sent.lock().unwrap().push((chat_id, text.to_string()));
  }
}
