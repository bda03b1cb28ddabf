//! Audit relay
//!
//! Posts every consent action to the host's logging endpoint as proof of
//! consent. The request is form-encoded and carries the host's anti-forgery
//! nonce.

use serde::Serialize;
use tokio::task::JoinHandle;
use url::Url;

use keks_consent::{Categories, ConsentAction, ConsentId};

use crate::error::NotifyError;
use crate::Result;

/// Value of the `action` field the host routes on
pub const LOG_ACTION: &str = "keks_log_consent";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditEntry {
    pub consent_id: ConsentId,
    pub action: ConsentAction,
    /// Empty for revocations
    pub categories: Categories,
    /// Page the action happened on
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct AuditRelay {
    client: reqwest::Client,
    endpoint: Url,
    nonce: String,
}

impl AuditRelay {
    pub fn new(endpoint: Url, nonce: impl Into<String>) -> Result<Self> {
        // No request timeout: a page navigation abandons the task anyway
        let client = reqwest::Client::builder()
            .user_agent("Mozilla/5.0 (Keks)")
            .build()?;

        Ok(Self {
            client,
            endpoint,
            nonce: nonce.into(),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn form_fields(&self, entry: &AuditEntry) -> Vec<(&'static str, String)> {
        let categories =
            serde_json::to_string(&entry.categories).unwrap_or_else(|_| "{}".to_string());

        vec![
            ("action", LOG_ACTION.to_string()),
            ("nonce", self.nonce.clone()),
            ("consent_id", entry.consent_id.to_string()),
            ("consent_action", entry.action.to_string()),
            ("categories", categories),
            ("url", entry.url.clone()),
        ]
    }

    pub async fn send(&self, entry: &AuditEntry) -> Result<()> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .form(&self.form_fields(entry))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(NotifyError::Status(response.status().as_u16()));
        }

        tracing::debug!(action = %entry.action, consent_id = %entry.consent_id, "Consent logged");
        Ok(())
    }

    /// Send in a detached task; failures are logged with `failure_message`.
    ///
    /// Returns `None` when no tokio runtime is running, in which case nothing
    /// is sent.
    pub fn dispatch(&self, entry: AuditEntry, failure_message: String) -> Option<JoinHandle<()>> {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                tracing::warn!(action = %entry.action, "{}: no async runtime", failure_message);
                return None;
            }
        };

        let relay = self.clone();
        Some(handle.spawn(async move {
            if let Err(e) = relay.send(&entry).await {
                tracing::warn!(action = %entry.action, error = %e, "{}", failure_message);
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn entry(action: ConsentAction) -> AuditEntry {
        AuditEntry {
            consent_id: ConsentId::generate(),
            action,
            categories: [("necessary".to_string(), true), ("marketing".to_string(), false)]
                .into_iter()
                .collect(),
            url: "https://example.com/page?x=1".to_string(),
        }
    }

    fn relay(endpoint: &str) -> AuditRelay {
        AuditRelay::new(Url::parse(endpoint).unwrap(), "abc123").unwrap()
    }

    #[test]
    fn test_form_fields() {
        let relay = relay("https://example.com/wp-admin/admin-ajax.php");
        let entry = entry(ConsentAction::Custom);
        let fields = relay.form_fields(&entry);

        assert_eq!(fields[0], ("action", "keks_log_consent".to_string()));
        assert_eq!(fields[1], ("nonce", "abc123".to_string()));
        assert_eq!(fields[2], ("consent_id", entry.consent_id.to_string()));
        assert_eq!(fields[3], ("consent_action", "custom".to_string()));
        assert_eq!(
            fields[4],
            ("categories", r#"{"necessary":true,"marketing":false}"#.to_string())
        );
        assert_eq!(fields[5], ("url", "https://example.com/page?x=1".to_string()));
    }

    #[test]
    fn test_dispatch_without_runtime_is_skipped() {
        let relay = relay("http://127.0.0.1:9/log");
        assert!(relay
            .dispatch(entry(ConsentAction::AcceptAll), "failed".to_string())
            .is_none());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_swallowed() {
        // Bind then drop so the port is closed
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let relay = relay(&format!("http://{}/log", addr));
        let handle = relay
            .dispatch(entry(ConsentAction::Revoke), "Keks: Revoke logging failed".to_string())
            .unwrap();

        // The task finishes without panicking
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_posts_form_body() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 8192];
            let mut received = Vec::new();
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                received.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&received);
                if n == 0 || text.contains("url=") {
                    break;
                }
            }
            socket
                .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 2\r\nconnection: close\r\n\r\n{}")
                .await
                .unwrap();
            String::from_utf8_lossy(&received).to_string()
        });

        let relay = relay(&format!("http://{}/wp-admin/admin-ajax.php", addr));
        relay.send(&entry(ConsentAction::AcceptAll)).await.unwrap();

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /wp-admin/admin-ajax.php"));
        assert!(request
            .to_ascii_lowercase()
            .contains("content-type: application/x-www-form-urlencoded"));
        assert!(request.contains("action=keks_log_consent"));
        assert!(request.contains("consent_action=accept_all"));
        assert!(request.contains("nonce=abc123"));
    }
}
