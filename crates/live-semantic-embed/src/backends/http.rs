use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use live_semantic_types::{Embedding, Filter, Frame};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::engine::{DimensionLock, EmbeddingProvider};
use crate::error::{EmbedError, EmbedResult};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Talks to a remote embedding service.
///
/// `POST {endpoint}/embed/text` takes `{"model", "text"}` and
/// `POST {endpoint}/embed/image` takes `{"model", "image"}` with the frame
/// bytes base64 encoded. Both answer `{"embedding": [..]}`.
#[derive(Debug)]
pub struct HttpEmbedder {
    client: Client,
    text_url: Url,
    image_url: Url,
    model: Option<String>,
    dimensions: DimensionLock,
}

#[derive(Serialize)]
struct TextRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    text: &'a str,
}

#[derive(Serialize)]
struct ImageRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    image: String,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

impl HttpEmbedder {
    pub fn new(
        endpoint: &str,
        model: Option<String>,
        timeout: Option<Duration>,
    ) -> EmbedResult<Self> {
        let base = parse_endpoint(endpoint)?;
        let text_url = join(&base, "embed/text")?;
        let image_url = join(&base, "embed/image")?;
        let client = Client::builder()
            .timeout(timeout.unwrap_or(DEFAULT_TIMEOUT))
            .build()
            .map_err(|err| {
                EmbedError::configuration(format!("failed to create HTTP client: {err}"))
            })?;
        tracing::info!(
            endpoint = %base,
            model = model.as_deref().unwrap_or("default"),
            "created HTTP embedding provider"
        );
        Ok(Self {
            client,
            text_url,
            image_url,
            model,
            dimensions: DimensionLock::default(),
        })
    }

    pub fn dimensions(&self) -> Option<usize> {
        self.dimensions.dimensions()
    }

    async fn post<B: Serialize + ?Sized>(&self, url: &Url, body: &B) -> EmbedResult<Embedding> {
        let response = self
            .client
            .post(url.clone())
            .json(body)
            .send()
            .await
            .map_err(|err| EmbedError::backend(format!("request to {url} failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(EmbedError::backend(format!(
                "embedding service returned {status}: {}",
                text.trim()
            )));
        }

        let parsed: EmbeddingResponse = response.json().await.map_err(|err| {
            EmbedError::backend(format!("failed to parse embedding response: {err}"))
        })?;
        self.dimensions.check(&parsed.embedding)?;
        tracing::trace!(dimensions = parsed.embedding.len(), "received embedding");
        Ok(parsed.embedding)
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbedder {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn encode_text(&self, filter: &mut Filter) -> EmbedResult<()> {
        let request = TextRequest {
            model: self.model.as_deref(),
            text: filter.text(),
        };
        let embedding = self.post(&self.text_url, &request).await?;
        filter.resolve(embedding)?;
        Ok(())
    }

    async fn encode_image(&self, frame: &Frame) -> EmbedResult<Embedding> {
        let request = ImageRequest {
            model: self.model.as_deref(),
            image: STANDARD.encode(frame.image_data()),
        };
        self.post(&self.image_url, &request).await
    }
}

fn parse_endpoint(endpoint: &str) -> EmbedResult<Url> {
    let trimmed = endpoint.trim();
    let with_slash = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    };
    Url::parse(&with_slash).map_err(|err| {
        EmbedError::configuration(format!("invalid embedding endpoint '{endpoint}': {err}"))
    })
}

fn join(base: &Url, path: &str) -> EmbedResult<Url> {
    base.join(path).map_err(|err| {
        EmbedError::configuration(format!("invalid embedding endpoint '{base}': {err}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::SystemTime;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn endpoint_paths_are_joined_under_the_base() {
        let embedder = HttpEmbedder::new("http://localhost:9000/v1", None, None).unwrap();
        assert_eq!(embedder.text_url.as_str(), "http://localhost:9000/v1/embed/text");
        assert_eq!(embedder.image_url.as_str(), "http://localhost:9000/v1/embed/image");
    }

    #[test]
    fn invalid_endpoint_is_a_configuration_error() {
        let err = HttpEmbedder::new("not a url", None, None).unwrap_err();
        assert!(matches!(err, EmbedError::Configuration { .. }));
    }

    #[tokio::test]
    async fn encodes_text_and_images() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embed/text"))
            .and(body_partial_json(json!({"text": "a cat", "model": "clip"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"embedding": [1.0, 0.0]})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/embed/image"))
            .and(body_partial_json(json!({"image": "AQID"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"embedding": [0.5, 0.5]})))
            .mount(&server)
            .await;

        let embedder = HttpEmbedder::new(&server.uri(), Some("clip".into()), None).unwrap();
        let mut filter = Filter::new("a cat");
        embedder.encode_text(&mut filter).await.unwrap();
        assert_eq!(filter.embedding(), Some(&[1.0, 0.0][..]));

        let frame = Frame::new(0, SystemTime::now(), vec![1, 2, 3]);
        let embedding = embedder.encode_image(&frame).await.unwrap();
        assert_eq!(embedding, vec![0.5, 0.5]);
        assert_eq!(embedder.dimensions(), Some(2));
    }

    #[tokio::test]
    async fn server_errors_surface_as_backend_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embed/image"))
            .respond_with(ResponseTemplate::new(500).set_body_string("model crashed"))
            .mount(&server)
            .await;

        let embedder = HttpEmbedder::new(&server.uri(), None, None).unwrap();
        let frame = Frame::new(0, SystemTime::now(), vec![0]);
        let err = embedder.encode_image(&frame).await.unwrap_err();
        match err {
            EmbedError::Backend { message } => assert!(message.contains("model crashed")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn dimension_changes_are_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embed/text"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"embedding": [1.0, 0.0, 0.0]})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/embed/image"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"embedding": [1.0]})))
            .mount(&server)
            .await;

        let embedder = HttpEmbedder::new(&server.uri(), None, None).unwrap();
        let mut filter = Filter::new("dog");
        embedder.encode_text(&mut filter).await.unwrap();
        let frame = Frame::new(0, SystemTime::now(), vec![0]);
        let err = embedder.encode_image(&frame).await.unwrap_err();
        assert!(matches!(
            err,
            EmbedError::DimensionMismatch {
                expected: 3,
                actual: 1
            }
        ));
    }
}
