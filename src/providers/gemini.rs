use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::{self, BoxStream};
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::core::assistant::{AssistantProvider, EMPTY_REPLY, GenerationConfig, error_chunk};
use crate::core::error::FetchError;
use crate::providers::util::{check_status, endpoint};

/// Gemini `generateContent` REST client.
pub struct GeminiProvider {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
    generation: GenerationConfig,
}

impl GeminiProvider {
    pub fn new(
        client: Client,
        base_url: &str,
        model: &str,
        api_key: String,
        generation: GenerationConfig,
    ) -> Self {
        GeminiProvider {
            client,
            base_url: base_url.to_string(),
            model: model.to_string(),
            api_key,
            generation,
        }
    }

    fn url(&self, method: &str, params: &[(&str, &str)]) -> Result<Url, FetchError> {
        let mut query = params.to_vec();
        query.push(("key", self.api_key.as_str()));
        endpoint(
            &self.base_url,
            &format!("v1beta/models/{}:{method}", self.model),
            &query,
        )
    }

    fn request(&self, url: Url, prompt: &str) -> RequestBuilder {
        let body = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: WireGenerationConfig::from(&self.generation),
        };
        self.client.post(url).json(&body)
    }
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: WireGenerationConfig,
}

#[derive(Serialize, Debug)]
struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(Serialize, Debug)]
struct Part {
    text: String,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct WireGenerationConfig {
    temperature: f32,
    top_k: u32,
    top_p: f32,
    max_output_tokens: u32,
}

impl From<&GenerationConfig> for WireGenerationConfig {
    fn from(config: &GenerationConfig) -> Self {
        WireGenerationConfig {
            temperature: config.temperature,
            top_k: config.top_k,
            top_p: config.top_p,
            max_output_tokens: config.max_output_tokens,
        }
    }
}

#[derive(Deserialize, Debug)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize, Debug)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize, Debug)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize, Debug)]
struct ResponsePart {
    text: Option<String>,
}

impl GenerateResponse {
    /// Text parts of the first candidate, joined.
    fn text(&self) -> Option<String> {
        let parts = &self.candidates.first()?.content.as_ref()?.parts;
        let text: String = parts.iter().filter_map(|p| p.text.as_deref()).collect();
        (!text.is_empty()).then_some(text)
    }
}

/// Splits a server-sent event byte stream into `data:` payloads.
#[derive(Debug, Default)]
struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    fn feed(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);
        let mut payloads = Vec::new();
        while let Some(end) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=end).collect();
            payloads.extend(data_payload(&line));
        }
        payloads
    }

    fn finish(&mut self) -> Vec<String> {
        let rest = std::mem::take(&mut self.buffer);
        data_payload(&rest).into_iter().collect()
    }
}

fn data_payload(line: &[u8]) -> Option<String> {
    let line = std::str::from_utf8(line).ok()?.trim_end_matches(['\r', '\n']);
    let payload = line.strip_prefix("data:")?.trim_start();
    (!payload.is_empty() && payload != "[DONE]").then(|| payload.to_string())
}

fn decode_events(payloads: Vec<String>) -> Result<Vec<String>, FetchError> {
    payloads
        .iter()
        .map(|payload| serde_json::from_str::<GenerateResponse>(payload).map(|r| r.text()))
        .filter_map(|parsed| parsed.map_err(FetchError::from).transpose())
        .collect()
}

enum StreamState {
    Pending(RequestBuilder),
    Reading {
        response: Response,
        decoder: SseDecoder,
    },
    Finished,
}

/// One step of the reply stream. Yields zero or more text chunks; any failure
/// yields a single error chunk and ends the stream.
async fn advance(state: StreamState) -> Option<(Vec<String>, StreamState)> {
    let failed = |e: FetchError| Some((vec![error_chunk(&e)], StreamState::Finished));
    match state {
        StreamState::Pending(request) => {
            let opened = match request.send().await {
                Ok(response) => check_status(response, "stream"),
                Err(e) => Err(FetchError::from(e.without_url())),
            };
            match opened {
                Ok(response) => Some((
                    Vec::new(),
                    StreamState::Reading {
                        response,
                        decoder: SseDecoder::default(),
                    },
                )),
                Err(e) => failed(e),
            }
        }
        StreamState::Reading {
            mut response,
            mut decoder,
        } => match response.chunk().await {
            Ok(Some(bytes)) => match decode_events(decoder.feed(&bytes)) {
                Ok(texts) => Some((texts, StreamState::Reading { response, decoder })),
                Err(e) => failed(e),
            },
            Ok(None) => match decode_events(decoder.finish()) {
                Ok(texts) => Some((texts, StreamState::Finished)),
                Err(e) => failed(e),
            },
            Err(e) => failed(FetchError::from(e.without_url())),
        },
        StreamState::Finished => None,
    }
}

#[async_trait]
impl AssistantProvider for GeminiProvider {
    #[instrument(name = "GeminiAsk", skip_all, fields(model = %self.model))]
    async fn ask(&self, prompt: &str) -> Result<String, FetchError> {
        let url = self.url("generateContent", &[])?;
        debug!(chars = prompt.len(), "Sending prompt");
        let response = self
            .request(url, prompt)
            .send()
            .await
            .map_err(|e| FetchError::from(e.without_url()))?;
        let text = check_status(response, &self.model)?
            .text()
            .await
            .map_err(|e| FetchError::from(e.without_url()))?;
        let reply: GenerateResponse = serde_json::from_str(&text)?;
        Ok(reply.text().unwrap_or_else(|| EMPTY_REPLY.to_string()))
    }

    fn ask_stream(&self, prompt: &str) -> BoxStream<'static, String> {
        let request = match self.url("streamGenerateContent", &[("alt", "sse")]) {
            Ok(url) => self.request(url, prompt),
            Err(e) => return stream::once(async move { error_chunk(&e) }).boxed(),
        };
        debug!(model = %self.model, "Opening reply stream");
        stream::unfold(StreamState::Pending(request), advance)
            .flat_map(stream::iter)
            .filter(|chunk| futures::future::ready(!chunk.is_empty()))
            .boxed()
    }
}
