use crate::backend::{normalize, EmbeddingBackend};
use crate::config::EmbedderConfig;
use crate::error::{EmbedderError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// OpenAI-style embeddings client (`POST {base_url}/v1/embeddings`).
pub struct OpenAiBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    dimension: usize,
}

impl OpenAiBackend {
    pub fn from_config(config: &EmbedderConfig) -> Result<Self> {
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| "https://api.openai.com".to_string());
        let key_env = config
            .api_key_env
            .clone()
            .unwrap_or_else(|| "OPENAI_API_KEY".to_string());
        let api_key = std::env::var(&key_env).map_err(|_| {
            EmbedderError::InvalidConfig(format!("API key environment variable {key_env} not set"))
        })?;
        Ok(Self {
            client: build_client(config)?,
            base_url,
            api_key,
            model: config.model.clone(),
            dimension: config.dimension,
        })
    }
}

#[derive(Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct OpenAiResponse {
    data: Vec<OpenAiEmbedding>,
}

#[derive(Deserialize)]
struct OpenAiEmbedding {
    index: usize,
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingBackend for OpenAiBackend {
    fn id(&self) -> String {
        format!("openai:{}", self.model)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/v1/embeddings", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&OpenAiRequest {
                model: &self.model,
                input: texts,
            })
            .send()
            .await
            .map_err(classify_send_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(status, &url));
        }

        let body: OpenAiResponse = response
            .json()
            .await
            .map_err(|err| EmbedderError::Permanent(format!("malformed response from {url}: {err}")))?;

        // The API may reorder results; `index` restores input order.
        let mut data = body.data;
        data.sort_by_key(|item| item.index);
        let mut vectors = Vec::with_capacity(data.len());
        for mut item in data {
            normalize(&mut item.embedding);
            vectors.push(item.embedding);
        }
        Ok(vectors)
    }
}

/// Ollama-style embeddings client (`POST {base_url}/api/embed`).
pub struct OllamaBackend {
    client: reqwest::Client,
    base_url: String,
    model: String,
    dimension: usize,
}

impl OllamaBackend {
    pub fn from_config(config: &EmbedderConfig) -> Result<Self> {
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| "http://localhost:11434".to_string());
        Ok(Self {
            client: build_client(config)?,
            base_url,
            model: config.model.clone(),
            dimension: config.dimension,
        })
    }
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct OllamaResponse {
    embeddings: Vec<Vec<f32>>,
}

#[async_trait]
impl EmbeddingBackend for OllamaBackend {
    fn id(&self) -> String {
        format!("ollama:{}", self.model)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/api/embed", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .json(&OllamaRequest {
                model: &self.model,
                input: texts,
            })
            .send()
            .await
            .map_err(classify_send_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(status, &url));
        }

        let body: OllamaResponse = response
            .json()
            .await
            .map_err(|err| EmbedderError::Permanent(format!("malformed response from {url}: {err}")))?;

        let mut vectors = body.embeddings;
        for vector in &mut vectors {
            normalize(vector);
        }
        Ok(vectors)
    }
}

fn build_client(config: &EmbedderConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(config.request_timeout())
        .build()
        .map_err(|err| EmbedderError::InvalidConfig(format!("failed to build HTTP client: {err}")))
}

fn classify_send_error(err: reqwest::Error) -> EmbedderError {
    if err.is_timeout() || err.is_connect() {
        EmbedderError::Transient(err.to_string())
    } else {
        EmbedderError::Permanent(err.to_string())
    }
}

fn classify_status(status: reqwest::StatusCode, url: &str) -> EmbedderError {
    let message = format!("{url} returned {status}");
    if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        EmbedderError::Transient(message)
    } else {
        EmbedderError::Permanent(message)
    }
}
