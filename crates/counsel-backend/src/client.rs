//! The `AiBackend` trait and its reqwest implementation.
//!
//! Six logical operations: plain chat, agent chat, upload-and-chat,
//! translate, detect-language, and generate-document. All return the raw
//! JSON the service produced; classification happens at the call site
//! (see `reply::BackendReply::classify`), and the raw value doubles as
//! the cacheable representation of a reply.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use counsel_core::config::BackendConfig;

use crate::error::BackendError;

/// The outbound contract to the AI inference service.
///
/// Injected as an `Arc<dyn AiBackend>` so orchestration code is testable
/// against a scripted double.
#[async_trait]
pub trait AiBackend: Send + Sync {
    /// Stateless single-turn chat.
    async fn chat(&self, prompt: &str) -> Result<Value, BackendError>;

    /// Tool-using agent chat, optionally continuing a session and bound
    /// to an uploaded document.
    async fn agent_chat(
        &self,
        message: &str,
        session_id: Option<&str>,
        document_id: Option<&str>,
    ) -> Result<Value, BackendError>;

    /// Upload a file and open (or continue) an agent session over it.
    #[allow(clippy::too_many_arguments)]
    async fn upload_and_chat(
        &self,
        file: Vec<u8>,
        file_name: &str,
        message: &str,
        session_id: Option<&str>,
        input_language: Option<&str>,
        output_language: Option<&str>,
    ) -> Result<Value, BackendError>;

    async fn translate(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<Value, BackendError>;

    async fn detect_language(&self, text: &str) -> Result<Value, BackendError>;

    async fn generate_document(
        &self,
        template_name: &str,
        data: Value,
    ) -> Result<Value, BackendError>;
}

/// HTTP client for the inference service.
pub struct BackendClient {
    http: reqwest::Client,
    base_url: String,
}

impl BackendClient {
    /// Build a client from configuration.
    ///
    /// The timeout is generous (120 s default) because the remote service
    /// may need to wake from a cold start.
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| BackendError::Request(format!("failed to build client: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post_json(&self, path: &str, body: &Value) -> Result<Value, BackendError> {
        let response = self.http.post(self.url(path)).json(body).send().await?;
        Self::read_json(response).await
    }

    async fn read_json(response: reqwest::Response) -> Result<Value, BackendError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json::<Value>().await?)
    }
}

#[async_trait]
impl AiBackend for BackendClient {
    async fn chat(&self, prompt: &str) -> Result<Value, BackendError> {
        self.post_json("/api/v1/chat", &json!({ "prompt": prompt }))
            .await
    }

    async fn agent_chat(
        &self,
        message: &str,
        session_id: Option<&str>,
        document_id: Option<&str>,
    ) -> Result<Value, BackendError> {
        let body = json!({
            "message": message,
            "session_id": session_id.unwrap_or(""),
            "document_id": document_id.unwrap_or(""),
        });
        self.post_json("/api/v1/agent/chat", &body).await
    }

    async fn upload_and_chat(
        &self,
        file: Vec<u8>,
        file_name: &str,
        message: &str,
        session_id: Option<&str>,
        input_language: Option<&str>,
        output_language: Option<&str>,
    ) -> Result<Value, BackendError> {
        let part = reqwest::multipart::Part::bytes(file).file_name(file_name.to_string());
        let mut form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("initial_message", message.to_string());
        if let Some(session) = session_id {
            form = form.text("session_id", session.to_string());
        }
        if let Some(lang) = input_language {
            form = form.text("input_language", lang.to_string());
        }
        if let Some(lang) = output_language {
            form = form.text("output_language", lang.to_string());
        }

        let response = self
            .http
            .post(self.url("/api/v1/agent/upload-and-chat"))
            .multipart(form)
            .send()
            .await?;
        Self::read_json(response).await
    }

    async fn translate(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<Value, BackendError> {
        let body = json!({
            "text": text,
            "source_lang": source_lang,
            "target_lang": target_lang,
        });
        self.post_json("/api/v1/translate", &body).await
    }

    async fn detect_language(&self, text: &str) -> Result<Value, BackendError> {
        let response = self
            .http
            .post(self.url("/api/v1/agent/detect-language"))
            .query(&[("text", text)])
            .send()
            .await?;
        Self::read_json(response).await
    }

    async fn generate_document(
        &self,
        template_name: &str,
        data: Value,
    ) -> Result<Value, BackendError> {
        let body = json!({
            "template_name": template_name,
            "data": data,
        });
        self.post_json("/api/v1/generate-document", &body).await
    }
}
