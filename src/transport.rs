// ===============================
// src/transport.rs
// ===============================
//
// Outbound message transport. The dispatcher and the intake replies only
// talk to the trait; production wires TelegramTransport, local runs and
// tests wire MockTransport.
//
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use crate::domain::SubmitterId;
use crate::telegram;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("api rejected request: {0}")]
    Api(String),
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, destination: SubmitterId, text: &str) -> Result<(), TransportError>;

    async fn send_document(
        &self,
        destination: SubmitterId,
        bytes: Vec<u8>,
        filename: &str,
    ) -> Result<(), TransportError>;
}

// -------- Telegram --------

pub struct TelegramTransport {
    http: reqwest::Client,
    api_base: String,
    token: String,
}

impl TelegramTransport {
    pub fn new(api_base: &str, token: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.to_string(),
            token: token.to_string(),
        }
    }

    async fn check(rsp: reqwest::Response) -> Result<(), TransportError> {
        if rsp.status().is_success() {
            return Ok(());
        }
        let code = rsp.status();
        let body = rsp.text().await.unwrap_or_default();
        Err(TransportError::Api(format!("{code}: {body}")))
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn send(&self, destination: SubmitterId, text: &str) -> Result<(), TransportError> {
        let url = telegram::api_url(&self.api_base, &self.token, "sendMessage");
        let rsp = self
            .http
            .post(url)
            .json(&serde_json::json!({ "chat_id": destination, "text": text }))
            .send()
            .await?;
        Self::check(rsp).await
    }

    async fn send_document(
        &self,
        destination: SubmitterId,
        bytes: Vec<u8>,
        filename: &str,
    ) -> Result<(), TransportError> {
        let url = telegram::api_url(&self.api_base, &self.token, "sendDocument");
        let part = reqwest::multipart::Part::bytes(bytes).file_name(filename.to_string());
        let form = reqwest::multipart::Form::new()
            .text("chat_id", destination.to_string())
            .part("document", part);
        let rsp = self.http.post(url).multipart(form).send().await?;
        Self::check(rsp).await
    }
}

// -------- Mock (local runs) --------

/// Logs outbound traffic instead of sending it.
#[derive(Default)]
pub struct MockTransport {
    pub sent_texts: AtomicU64,
    pub sent_documents: AtomicU64,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, destination: SubmitterId, text: &str) -> Result<(), TransportError> {
        self.sent_texts.fetch_add(1, Ordering::Relaxed);
        info!(chat_id = %destination, %text, "mock transport: send");
        Ok(())
    }

    async fn send_document(
        &self,
        destination: SubmitterId,
        bytes: Vec<u8>,
        filename: &str,
    ) -> Result<(), TransportError> {
        self.sent_documents.fetch_add(1, Ordering::Relaxed);
        info!(chat_id = %destination, %filename, size = bytes.len(), "mock transport: send document");
        Ok(())
    }
}
