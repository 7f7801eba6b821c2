// Copyright (c) 2026 supernote-server contributors
// SPDX-License-Identifier: AGPL-3.0
//! OpenAI-compatible HTTP client implementing [`InferenceService`]. Acts as
//! an anti-corruption layer: translates the three domain operations (OCR,
//! embed, summarize) into Chat Completions / Embeddings requests and back,
//! the same shape as the teacher's `OpenAIAdapter` for `LLMProvider`.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::domain::inference::{InferenceError, InferenceService, SummaryResult};

const OCR_SYSTEM_PROMPT: &str =
    "Transcribe all handwritten and printed text visible in this image. Reply with the transcription only, no commentary.";
const SUMMARY_SYSTEM_PROMPT: &str = "Summarize the following handwritten notebook transcript. Respond with a JSON object \
containing exactly two fields: \"title\" (a short title, under ten words) and \"summary\" (a few sentences). Respond with \
JSON only, no surrounding text.";

pub struct HttpInferenceService {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    chat_model: String,
    embedding_model: String,
}

impl HttpInferenceService {
    pub fn new(endpoint: String, api_key: String, chat_model: String, embedding_model: String) -> Self {
        Self { client: reqwest::Client::new(), endpoint, api_key, chat_model, embedding_model }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.endpoint.trim_end_matches('/'), path)
    }

    async fn chat(&self, model: &str, system: &str, user_content: Vec<ContentPart>) -> Result<String, InferenceError> {
        let request = ChatRequest {
            model: model.to_string(),
            messages: vec![
                ChatMessage { role: "system".to_string(), content: vec![ContentPart::Text { text: system.to_string() }] },
                ChatMessage { role: "user".to_string(), content: user_content },
            ],
        };

        let response = self
            .client
            .post(self.url("chat/completions"))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| InferenceError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(InferenceError::Unavailable(format!("HTTP {status}: {body}")));
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| InferenceError::BadResponse(e.to_string()))?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| InferenceError::BadResponse("no choices in response".to_string()))
    }
}

#[async_trait]
impl InferenceService for HttpInferenceService {
    async fn ocr_page(&self, png: Bytes) -> Result<String, InferenceError> {
        let data_url = format!("data:image/png;base64,{}", STANDARD.encode(&png));
        let content = vec![ContentPart::ImageUrl { image_url: ImageUrl { url: data_url } }];
        self.chat(&self.chat_model, OCR_SYSTEM_PROMPT, content).await
    }

    async fn embed_text(&self, text: &str) -> Result<Vec<f32>, InferenceError> {
        let request = EmbeddingRequest { model: self.embedding_model.clone(), input: text.to_string() };
        let response = self
            .client
            .post(self.url("embeddings"))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| InferenceError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(InferenceError::Unavailable(format!("HTTP {status}: {body}")));
        }

        let parsed: EmbeddingResponse = response.json().await.map_err(|e| InferenceError::BadResponse(e.to_string()))?;
        parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| InferenceError::BadResponse("no embedding in response".to_string()))
    }

    async fn summarize(&self, transcript: &str) -> Result<SummaryResult, InferenceError> {
        let content = vec![ContentPart::Text { text: transcript.to_string() }];
        let raw = self.chat(&self.chat_model, SUMMARY_SYSTEM_PROMPT, content).await?;
        let parsed: SummaryJson = serde_json::from_str(raw.trim())
            .map_err(|e| InferenceError::BadResponse(format!("expected {{title,summary}} JSON: {e}")))?;
        Ok(SummaryResult { title: parsed.title, summary: parsed.summary, transcript: transcript.to_string() })
    }
}

#[derive(Deserialize)]
struct SummaryJson {
    title: String,
    summary: String,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: Vec<ContentPart>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}

#[derive(Serialize)]
struct EmbeddingRequest {
    model: String,
    input: String,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_request_serializes_text_and_image_parts() {
        let request = ChatRequest {
            model: "gpt-4o".to_string(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: vec![
                    ContentPart::Text { text: "hello".to_string() },
                    ContentPart::ImageUrl { image_url: ImageUrl { url: "data:image/png;base64,AA==".to_string() } },
                ],
            }],
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["messages"][0]["content"][0]["type"], "text");
        assert_eq!(value["messages"][0]["content"][1]["type"], "image_url");
    }

    #[test]
    fn summary_json_parses_title_and_summary() {
        let parsed: SummaryJson = serde_json::from_str(r#"{"title":"Shopping list","summary":"Milk, eggs, bread."}"#).unwrap();
        assert_eq!(parsed.title, "Shopping list");
    }

    #[tokio::test]
    async fn ocr_page_surfaces_http_error_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server.mock("POST", "/chat/completions").with_status(500).with_body("boom").create_async().await;
        let service = HttpInferenceService::new(server.url(), "key".to_string(), "gpt-4o".to_string(), "text-embedding-3-small".to_string());
        let result = service.ocr_page(Bytes::from_static(b"png-bytes")).await;
        assert!(matches!(result, Err(InferenceError::Unavailable(_))));
    }

    #[tokio::test]
    async fn embed_text_parses_embedding_vector() {
        let mut server = mockito::Server::new_async().await;
        let body = json!({"data": [{"embedding": [0.1, 0.2, 0.3]}]});
        let _mock = server
            .mock("POST", "/embeddings")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
            .create_async()
            .await;
        let service = HttpInferenceService::new(server.url(), "key".to_string(), "gpt-4o".to_string(), "text-embedding-3-small".to_string());
        let vector = service.embed_text("hello").await.unwrap();
        assert_eq!(vector, vec![0.1, 0.2, 0.3]);
    }
}
