//! HTTP transport for the annotation API

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;

use super::api::AnnotationApi;
use crate::auth::HEADER_USER_ROLE;
use crate::error::{ApiError, LibraryError};
use crate::models::{AnnotationPatch, AnnotationView, NewAnnotation};
use crate::security::Role;

/// Code used when the server answers without a readable error body
pub const UNEXPECTED_RESPONSE: &str = "UNEXPECTED_RESPONSE";

/// reqwest-backed client that sends the caller's role on every request
#[derive(Clone)]
pub struct HttpAnnotationClient {
    client: Client,
    base_url: String,
    role: Role,
}

impl HttpAnnotationClient {
    pub fn new(base_url: impl Into<String>, role: Role) -> Self {
        Self::with_client(Client::new(), base_url, role)
    }

    pub fn with_client(client: Client, base_url: impl Into<String>, role: Role) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            role,
        }
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    fn with_role(&self, req: RequestBuilder) -> RequestBuilder {
        req.header(HEADER_USER_ROLE, self.role.token())
    }

    async fn send(&self, req: RequestBuilder) -> Result<Response, ApiError> {
        let response = self
            .with_role(req)
            .send()
            .await
            .map_err(|e| LibraryError::from(e).to_api_error())?;
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(decode_error(response).await)
        }
    }

    async fn send_json<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, ApiError> {
        self.send(req)
            .await?
            .json::<T>()
            .await
            .map_err(|e| LibraryError::from(e).to_api_error())
    }
}

/// Turn an error response into the server's stable error kind
async fn decode_error(response: Response) -> ApiError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    serde_json::from_str::<ApiError>(&body).unwrap_or_else(|_| ApiError {
        code: UNEXPECTED_RESPONSE.to_string(),
        message: format!("HTTP {}: {}", status, body),
    })
}

#[async_trait]
impl AnnotationApi for HttpAnnotationClient {
    fn role(&self) -> Role {
        self.role
    }

    async fn list(&self, document_id: &str) -> Result<Vec<AnnotationView>, ApiError> {
        let url = self.api_url(&format!("/files/{}/annotations", document_id));
        self.send_json(self.client.get(url)).await
    }

    async fn create(
        &self,
        document_id: &str,
        request: &NewAnnotation,
    ) -> Result<AnnotationView, ApiError> {
        let url = self.api_url(&format!("/files/{}/annotations", document_id));
        self.send_json(self.client.post(url).json(request)).await
    }

    async fn update(&self, id: &str, patch: &AnnotationPatch) -> Result<AnnotationView, ApiError> {
        let url = self.api_url(&format!("/annotations/{}", id));
        self.send_json(self.client.patch(url).json(patch)).await
    }

    async fn delete(&self, id: &str) -> Result<(), ApiError> {
        let url = self.api_url(&format!("/annotations/{}", id));
        self.send(self.client.delete(url)).await.map(|_| ())
    }
}
