//! Document generation service: proxies the generate-document backend
//! operation and records the produced documents per user.

use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};
use uuid::Uuid;

use counsel_backend::AiBackend;
use counsel_core::types::GeneratedDocument;
use counsel_storage::{Database, DocumentRepository};

use crate::error::ChatError;
use crate::types::DocumentListing;

/// Recorded as the producer of generated documents.
const GENERATOR_NAME: &str = "counsel-inference-backend";

pub struct DocumentService {
    documents: DocumentRepository,
    backend: Arc<dyn AiBackend>,
}

impl DocumentService {
    pub fn new(db: Arc<Database>, backend: Arc<dyn AiBackend>) -> Self {
        Self {
            documents: DocumentRepository::new(db),
            backend,
        }
    }

    /// Generate a document from a prompt and persist its metadata.
    pub async fn generate_document(
        &self,
        user_id: Uuid,
        prompt: &str,
        format: &str,
    ) -> Result<GeneratedDocument, ChatError> {
        if prompt.trim().is_empty() {
            return Err(ChatError::Validation("prompt cannot be empty".to_string()));
        }

        let template_data = json!({
            "prompt": prompt,
            "format": format,
            "user_instructions": prompt,
        });
        let result = self
            .backend
            .generate_document("default", template_data)
            .await?;

        let now = Utc::now();
        let document = GeneratedDocument {
            id: Uuid::new_v4(),
            user_id,
            title: format!("Document {}", now.format("%Y-%m-%dT%H:%M:%S")),
            content: result
                .get("document_content")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            format: format.to_string(),
            file_url: result
                .get("file_url")
                .and_then(Value::as_str)
                .map(str::to_string),
            prompt: prompt.to_string(),
            generated_by: GENERATOR_NAME.to_string(),
            created_at: now,
        };
        self.documents.insert(&document)?;

        Ok(document)
    }

    /// Listing projection of a user's documents, newest first.
    pub async fn get_user_documents(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<DocumentListing>, ChatError> {
        Ok(self
            .documents
            .list_for_user(user_id)?
            .into_iter()
            .map(|d| DocumentListing {
                id: d.id,
                title: d.title,
                format: d.format,
                file_url: d.file_url,
                created_at: d.created_at,
            })
            .collect())
    }

    /// Fetch one document, ownership-checked.
    pub async fn get_document(
        &self,
        user_id: Uuid,
        document_id: Uuid,
    ) -> Result<GeneratedDocument, ChatError> {
        self.documents
            .find_for_user(document_id, user_id)?
            .ok_or(ChatError::DocumentNotFound)
    }

    /// Delete one document, ownership-checked.
    pub async fn delete_document(
        &self,
        user_id: Uuid,
        document_id: Uuid,
    ) -> Result<(), ChatError> {
        if !self.documents.delete_for_user(document_id, user_id)? {
            return Err(ChatError::DocumentNotFound);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use counsel_backend::BackendError;
    use counsel_core::types::{Provider, User};
    use counsel_storage::UserRepository;

    struct StubBackend {
        reply: Value,
    }

    #[async_trait]
    impl AiBackend for StubBackend {
        async fn chat(&self, _prompt: &str) -> Result<Value, BackendError> {
            unimplemented!("not exercised")
        }
        async fn agent_chat(
            &self,
            _message: &str,
            _session_id: Option<&str>,
            _document_id: Option<&str>,
        ) -> Result<Value, BackendError> {
            unimplemented!("not exercised")
        }
        async fn upload_and_chat(
            &self,
            _file: Vec<u8>,
            _file_name: &str,
            _message: &str,
            _session_id: Option<&str>,
            _input_language: Option<&str>,
            _output_language: Option<&str>,
        ) -> Result<Value, BackendError> {
            unimplemented!("not exercised")
        }
        async fn translate(
            &self,
            _text: &str,
            _source_lang: &str,
            _target_lang: &str,
        ) -> Result<Value, BackendError> {
            unimplemented!("not exercised")
        }
        async fn detect_language(&self, _text: &str) -> Result<Value, BackendError> {
            unimplemented!("not exercised")
        }
        async fn generate_document(
            &self,
            _template_name: &str,
            _data: Value,
        ) -> Result<Value, BackendError> {
            Ok(self.reply.clone())
        }
    }

    fn fixture(reply: Value) -> (DocumentService, Uuid) {
        let db = Arc::new(Database::in_memory().unwrap());
        let user_id = Uuid::new_v4();
        let now = Utc::now();
        UserRepository::new(Arc::clone(&db))
            .insert(&User {
                id: user_id,
                email: format!("{}@example.com", user_id),
                password_hash: None,
                name: "Test".to_string(),
                avatar: None,
                provider: Provider::Local,
                share_enabled: true,
                last_login_at: None,
                created_at: now,
                updated_at: now,
            })
            .unwrap();

        let service = DocumentService::new(db, Arc::new(StubBackend { reply }));
        (service, user_id)
    }

    #[tokio::test]
    async fn test_generate_persists_and_lists() {
        let (service, user_id) = fixture(serde_json::json!({
            "document_content": "WHEREAS the parties agree...",
            "file_url": "https://files.example/doc.pdf",
        }));

        let document = service
            .generate_document(user_id, "draft an NDA", "pdf")
            .await
            .unwrap();
        assert!(document.content.starts_with("WHEREAS"));
        assert_eq!(document.generated_by, GENERATOR_NAME);

        let listed = service.get_user_documents(user_id).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, document.id);
        assert_eq!(listed[0].file_url.as_deref(), Some("https://files.example/doc.pdf"));
    }

    #[tokio::test]
    async fn test_generate_tolerates_missing_content() {
        let (service, user_id) = fixture(serde_json::json!({}));
        let document = service
            .generate_document(user_id, "draft a will", "pdf")
            .await
            .unwrap();
        assert!(document.content.is_empty());
    }

    #[tokio::test]
    async fn test_empty_prompt_is_validation_error() {
        let (service, user_id) = fixture(serde_json::json!({}));
        let err = service
            .generate_document(user_id, "", "pdf")
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::Validation(_)));
    }

    #[tokio::test]
    async fn test_get_and_delete_are_ownership_checked() {
        let (service, user_id) = fixture(serde_json::json!({ "document_content": "x" }));
        let document = service
            .generate_document(user_id, "draft", "pdf")
            .await
            .unwrap();

        let stranger = Uuid::new_v4();
        assert!(matches!(
            service.get_document(stranger, document.id).await.unwrap_err(),
            ChatError::DocumentNotFound
        ));
        assert!(matches!(
            service.delete_document(stranger, document.id).await.unwrap_err(),
            ChatError::DocumentNotFound
        ));

        assert!(service.get_document(user_id, document.id).await.is_ok());
        assert!(service.delete_document(user_id, document.id).await.is_ok());
        assert!(matches!(
            service.get_document(user_id, document.id).await.unwrap_err(),
            ChatError::DocumentNotFound
        ));
    }
}
