//! Telegram notifier: delivers notifications through the Bot API.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::error::NotifyError;
use crate::notify::Notifier;

/// Public Bot API endpoint.
pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Maximum sendMessage text length, counted in UTF-8 bytes.
///
/// Telegram counts the limit in characters, which a byte count never exceeds.
const TELEGRAM_MAX_MESSAGE_LENGTH: usize = 4096;

/// Bot API response wrapper: `{"ok": bool, "result": T, "description": "..."}`.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BotUser {
    #[serde(default)]
    username: Option<String>,
}

/// Sends notifications as plain-text Telegram messages.
pub struct TelegramNotifier {
    bot_token: SecretString,
    api_base: String,
    client: reqwest::Client,
}

impl TelegramNotifier {
    /// Fails if the token is empty.
    pub fn new(bot_token: SecretString) -> Result<Self, NotifyError> {
        if bot_token.expose_secret().is_empty() {
            return Err(NotifyError::NotConfigured {
                name: "telegram".into(),
                reason: "TELEGRAM_BOT_TOKEN is not set".into(),
            });
        }
        Ok(Self {
            bot_token,
            api_base: DEFAULT_API_BASE.to_string(),
            client: reqwest::Client::new(),
        })
    }

    /// Point the notifier at another Bot API server.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    fn api_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{method}",
            self.api_base,
            self.bot_token.expose_secret()
        )
    }

    /// Check the token with `getMe`. Returns the bot's username.
    pub async fn verify(&self) -> Result<String, NotifyError> {
        let resp = self
            .client
            .get(self.api_url("getMe"))
            .send()
            .await
            .map_err(|e| NotifyError::Http(redact(&e.to_string(), &self.bot_token)))?;

        let status = resp.status();
        let body: ApiResponse<BotUser> = resp.json().await.map_err(|e| {
            NotifyError::Http(format!("getMe returned {status}: {}", redact(&e.to_string(), &self.bot_token)))
        })?;

        match (body.ok, body.result) {
            (true, Some(user)) => {
                let username = user.username.unwrap_or_default();
                tracing::info!(username = %username, "Telegram bot authorized");
                Ok(username)
            }
            _ => Err(NotifyError::NotConfigured {
                name: "telegram".into(),
                reason: body
                    .description
                    .unwrap_or_else(|| format!("getMe failed with status {status}")),
            }),
        }
    }

    /// Send a single chunk (at most 4096 bytes).
    async fn send_message_chunk(&self, chat_id: i64, text: &str) -> Result<(), NotifyError> {
        let body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
        });

        let resp = self
            .client
            .post(self.api_url("sendMessage"))
            .json(&body)
            .send()
            .await
            .map_err(|e| NotifyError::SendFailed {
                name: "telegram".into(),
                reason: redact(&e.to_string(), &self.bot_token),
            })?;

        if resp.status().is_success() {
            return Ok(());
        }

        let status = resp.status();
        let reason = match resp.json::<ApiResponse<serde_json::Value>>().await {
            Ok(ApiResponse {
                description: Some(description),
                ..
            }) => format!("sendMessage failed ({status}): {description}"),
            _ => format!("sendMessage failed ({status})"),
        };
        Err(NotifyError::SendFailed {
            name: "telegram".into(),
            reason,
        })
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn deliver(&self, recipient: i64, text: &str) -> Result<(), NotifyError> {
        for chunk in split_message(text, TELEGRAM_MAX_MESSAGE_LENGTH) {
            if let Err(e) = self.send_message_chunk(recipient, &chunk).await {
                tracing::error!(chat_id = recipient, error = %e, "Error sending message to Telegram");
                return Err(e);
            }
        }
        tracing::info!(chat_id = recipient, "Message sent to Telegram");
        Ok(())
    }
}

/// reqwest errors include the request URL, which embeds the token.
fn redact(message: &str, token: &SecretString) -> String {
    message.replace(token.expose_secret(), "<redacted>")
}

/// Split a message into chunks of at most `max_len` bytes.
/// Tries to split on newlines, then spaces, then hard-cuts on a char boundary.
fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        if remaining.len() <= max_len {
            chunks.push(remaining.to_string());
            break;
        }

        let mut limit = max_len;
        while !remaining.is_char_boundary(limit) {
            limit -= 1;
        }

        let chunk = &remaining[..limit];
        let split_at = chunk
            .rfind('\n')
            .or_else(|| chunk.rfind(' '))
            .unwrap_or(limit);

        // Don't split at position 0 (infinite loop guard)
        let split_at = if split_at == 0 { limit } else { split_at };

        chunks.push(remaining[..split_at].to_string());
        remaining = remaining[split_at..].trim_start();
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notifier(token: &str) -> TelegramNotifier {
        TelegramNotifier::new(SecretString::from(token.to_string())).unwrap()
    }

    #[test]
    fn telegram_api_url() {
        let n = notifier("123:ABC");
        assert_eq!(
            n.api_url("sendMessage"),
            "https://api.telegram.org/bot123:ABC/sendMessage"
        );
    }

    #[test]
    fn telegram_api_base_trailing_slash_trimmed() {
        let n = notifier("123:ABC").with_api_base("http://127.0.0.1:9000/");
        assert_eq!(n.api_url("getMe"), "http://127.0.0.1:9000/bot123:ABC/getMe");
    }

    #[test]
    fn telegram_empty_token_rejected() {
        let err = TelegramNotifier::new(SecretString::from(String::new()))
            .err()
            .expect("empty token must fail");
        assert!(err.to_string().contains("TELEGRAM_BOT_TOKEN is not set"));
    }

    #[test]
    fn redact_hides_token() {
        let token = SecretString::from("123:SECRET".to_string());
        let msg = redact("error sending request for url (https://x/bot123:SECRET/getMe)", &token);
        assert!(!msg.contains("SECRET"));
        assert!(msg.contains("<redacted>"));
    }

    #[tokio::test]
    async fn telegram_deliver_unreachable_server_fails() {
        let n = notifier("t").with_api_base("http://127.0.0.1:1");
        let result = n.deliver(1, "hi").await;
        assert!(matches!(result, Err(NotifyError::SendFailed { .. })));
    }

    // ── Message splitting tests ─────────────────────────────────────

    #[test]
    fn split_message_short() {
        let chunks = split_message("Hello", 4096);
        assert_eq!(chunks, vec!["Hello"]);
    }

    #[test]
    fn split_message_exact_limit() {
        let msg = "a".repeat(4096);
        let chunks = split_message(&msg, 4096);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].len(), 4096);
    }

    #[test]
    fn split_message_over_limit_on_newline() {
        let msg = format!("{}\n{}", "a".repeat(2000), "b".repeat(3000));
        let chunks = split_message(&msg, 4096);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], "a".repeat(2000));
        assert_eq!(chunks[1], "b".repeat(3000));
    }

    #[test]
    fn split_message_no_good_split_point() {
        let msg = "a".repeat(5000);
        let chunks = split_message(&msg, 4096);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].len(), 4096);
        assert_eq!(chunks[1].len(), 904);
    }

    #[test]
    fn split_message_respects_char_boundaries() {
        // 'é' is two bytes; 4096 falls in the middle of one.
        let msg = format!("a{}", "é".repeat(3000));
        let chunks = split_message(&msg, 4096);
        assert!(chunks.len() >= 2);
        assert!(chunks.iter().all(|c| c.len() <= 4096));
        assert_eq!(chunks.concat(), msg);
    }

    #[test]
    fn split_message_limit_is_in_bytes() {
        // 3000 characters but 6000 bytes.
        let msg = "é".repeat(3000);
        let chunks = split_message(&msg, TELEGRAM_MAX_MESSAGE_LENGTH);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].len(), 4096);
        assert_eq!(chunks[1].chars().count(), 3000 - 2048);
    }
}
