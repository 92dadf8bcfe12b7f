//! Telegram notification implementation.
//!
//! Sends plain-text messages to a single chat through the Bot API
//! `sendMessage` method. One request per alert, best effort, no retries.

use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use super::error::NotificationError;

/// Default Bot API endpoint. Overridable so tests can point the notifier at
/// a local mock server.
pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Bot credential and destination chat.
///
/// Loaded once at startup and immutable for the process lifetime.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub bot_token: String,
    pub chat_id: String,
}

impl Credentials {
    /// Load `BOT_TOKEN` and `CHAT_ID` from the process environment.
    ///
    /// A missing or empty variable is an error; callers treat it as
    /// startup-fatal before the serial device is touched.
    pub fn from_env() -> Result<Self, NotificationError> {
        Self::from_values(
            std::env::var("BOT_TOKEN").ok(),
            std::env::var("CHAT_ID").ok(),
        )
    }

    fn from_values(
        bot_token: Option<String>,
        chat_id: Option<String>,
    ) -> Result<Self, NotificationError> {
        let bot_token = bot_token
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| NotificationError::ConfigError("BOT_TOKEN is not set".to_string()))?;
        let chat_id = chat_id
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| NotificationError::ConfigError("CHAT_ID is not set".to_string()))?;

        Ok(Self { bot_token, chat_id })
    }
}

/// Subset of the Bot API response needed to judge success.
///
/// The API reports application-level failures with `"ok": false` even on
/// some 2xx responses.
#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    description: Option<String>,
}

/// Telegram notifier bound to one bot and one destination chat.
#[derive(Debug, Clone)]
pub struct TelegramNotifier {
    client: Client,
    api_base: String,
    credentials: Credentials,
}

impl TelegramNotifier {
    /// Create a notifier against the given API base, normally
    /// [`DEFAULT_API_BASE`].
    pub fn new(credentials: Credentials, api_base: &str) -> Self {
        Self {
            client: Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            credentials,
        }
    }

    /// Send one plain-text message to the configured chat.
    pub async fn send_text(&self, text: &str) -> Result<(), NotificationError> {
        let url = format!(
            "{}/bot{}/sendMessage",
            self.api_base, self.credentials.bot_token
        );
        let payload = json!({
            "chat_id": self.credentials.chat_id,
            "text": text,
        });

        let response = self.client.post(&url).json(&payload).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotificationError::NotifyFailed(format!(
                "sendMessage failed with status: {status}"
            )));
        }

        let body: ApiResponse = response.json().await?;
        if !body.ok {
            return Err(NotificationError::NotifyFailed(
                body.description
                    .unwrap_or_else(|| "sendMessage returned ok=false".to_string()),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_credentials() -> Credentials {
        Credentials {
            bot_token: "123:abc".to_string(),
            chat_id: "42".to_string(),
        }
    }

    ////////////////////////////////////////////////////////////
    // credential loading tests
    ////////////////////////////////////////////////////////////

    #[test]
    fn from_values_accepts_both_secrets() {
        let creds =
            Credentials::from_values(Some("123:abc".to_string()), Some("42".to_string())).unwrap();
        assert_eq!(creds.bot_token, "123:abc");
        assert_eq!(creds.chat_id, "42");
    }

    #[test]
    fn from_values_requires_bot_token() {
        let err = Credentials::from_values(None, Some("42".to_string())).unwrap_err();
        assert!(err.to_string().contains("BOT_TOKEN"));
    }

    #[test]
    fn from_values_requires_chat_id() {
        let err = Credentials::from_values(Some("123:abc".to_string()), None).unwrap_err();
        assert!(err.to_string().contains("CHAT_ID"));
    }

    #[test]
    fn from_values_rejects_empty_strings() {
        let err =
            Credentials::from_values(Some("  ".to_string()), Some("42".to_string())).unwrap_err();
        assert!(matches!(err, NotificationError::ConfigError(_)));
    }

    ////////////////////////////////////////////////////////////
    // send tests
    ////////////////////////////////////////////////////////////

    #[tokio::test]
    async fn send_text_posts_to_bot_endpoint() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/bot123:abc/sendMessage")
            .match_header("content-type", "application/json")
            .match_body(mockito::Matcher::Json(json!({
                "chat_id": "42",
                "text": "⚠️ Fire at parking slot!",
            })))
            .with_status(200)
            .with_body(r#"{"ok":true,"result":{}}"#)
            .create_async()
            .await;

        let notifier = TelegramNotifier::new(test_credentials(), &server.url());
        notifier.send_text("⚠️ Fire at parking slot!").await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn send_text_maps_http_error_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/bot123:abc/sendMessage")
            .with_status(401)
            .with_body(r#"{"ok":false,"description":"Unauthorized"}"#)
            .create_async()
            .await;

        let notifier = TelegramNotifier::new(test_credentials(), &server.url());
        let err = notifier.send_text("hello").await.unwrap_err();

        assert!(matches!(err, NotificationError::NotifyFailed(_)));
        assert!(err.to_string().contains("401"));
    }

    #[tokio::test]
    async fn send_text_maps_ok_false_body() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/bot123:abc/sendMessage")
            .with_status(200)
            .with_body(r#"{"ok":false,"description":"chat not found"}"#)
            .create_async()
            .await;

        let notifier = TelegramNotifier::new(test_credentials(), &server.url());
        let err = notifier.send_text("hello").await.unwrap_err();

        assert!(err.to_string().contains("chat not found"));
    }

    #[tokio::test]
    async fn send_text_fails_on_unreachable_host() {
        // Port 9 on localhost should refuse the connection.
        let notifier =
            TelegramNotifier::new(test_credentials(), "http://127.0.0.1:9");
        let err = notifier.send_text("hello").await.unwrap_err();

        assert!(matches!(err, NotificationError::RequestError(_)));
    }
}
