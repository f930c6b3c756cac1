use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::{Client, IntoUrl, Method, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use url::Url;

use crate::app_config::ProviderConfig;
use crate::audio::AudioSegment;
use crate::errors::{ApiErrorDetails, ProviderError, QuotaViolation};
use crate::providers::{RemoteFile, Transcriber};
use crate::subtitle_processor::SubtitleEntry;

// @module: Google Gemini transcription client

const API_KEY_HEADER: &str = "x-goog-api-key";
const USER_PROMPT: &str = "Create subtitles for this audio file";
const WAV_MIME_TYPE: &str = "audio/wav";
const FILE_POLL_INTERVAL: Duration = Duration::from_secs(1);
const FILE_POLL_ATTEMPTS: u32 = 30;

const SAFETY_CATEGORIES: [&str; 5] = [
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
    "HARM_CATEGORY_CIVIC_INTEGRITY",
];

/// Gemini client for the File API and `generateContent`
pub struct Gemini {
    /// HTTP client for API requests, pooled and shared across workers
    client: Client,
    /// API key for authentication
    api_key: String,
    /// Base URL, always ending with a slash
    endpoint: Url,
    model: String,
    system_prompt: String,
    temperature: f32,
}

impl std::fmt::Debug for Gemini {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gemini")
            .field("endpoint", &self.endpoint.as_str())
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .finish_non_exhaustive()
    }
}

/// generateContent request body
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    system_instruction: Content,
    contents: Vec<Content>,
    safety_settings: Vec<SafetySetting>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_data: Option<FileData>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileData {
    pub mime_type: String,
    pub file_uri: String,
}

#[derive(Debug, Serialize)]
struct SafetySetting {
    category: &'static str,
    threshold: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    response_mime_type: &'static str,
    response_schema: Value,
}

/// generateContent response body
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    pub usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub content: Option<Content>,
    pub finish_reason: Option<String>,
}

/// Token usage information
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    pub prompt_token_count: Option<u64>,
    pub candidates_token_count: Option<u64>,
    pub thoughts_token_count: Option<u64>,
    pub cached_content_token_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    file: UploadedFile,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadedFile {
    name: String,
    uri: String,
    mime_type: Option<String>,
    state: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: Option<ErrorBody>,
    message: Option<String>,
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    status: Option<String>,
    #[serde(default)]
    details: Vec<Value>,
}

impl GenerateContentRequest {
    /// Build a transcription request for an uploaded audio file
    pub fn for_audio(file: &RemoteFile, system_prompt: &str, temperature: f32) -> Self {
        Self {
            system_instruction: Content {
                role: None,
                parts: vec![Part { text: Some(system_prompt.to_string()), file_data: None }],
            },
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![
                    Part { text: Some(USER_PROMPT.to_string()), file_data: None },
                    Part {
                        text: None,
                        file_data: Some(FileData {
                            mime_type: file.mime_type.clone(),
                            file_uri: file.uri.clone(),
                        }),
                    },
                ],
            }],
            safety_settings: SAFETY_CATEGORIES
                .into_iter()
                .map(|category| SafetySetting { category, threshold: "BLOCK_NONE" })
                .collect(),
            generation_config: GenerationConfig {
                temperature,
                response_mime_type: "application/json",
                response_schema: subtitle_schema(),
            },
        }
    }
}

/// JSON schema of the transcript: an array of `{start, end, text}`
fn subtitle_schema() -> Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "start": { "type": "INTEGER", "description": "Subtitle start in milliseconds from the start of the audio" },
                "end": { "type": "INTEGER", "description": "Subtitle end in milliseconds from the start of the audio" },
                "text": { "type": "STRING", "description": "Lines of text spoken during the subtitle" }
            },
            "required": ["start", "end", "text"],
            "propertyOrdering": ["start", "end", "text"]
        }
    })
}

impl Gemini {
    /// Create a new Gemini client from the provider configuration
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let mut endpoint = config.endpoint.trim().to_string();
        if !endpoint.ends_with('/') {
            endpoint.push('/');
        }
        let endpoint = Url::parse(&endpoint)
            .map_err(|e| ProviderError::RequestFailed(format!("Invalid endpoint '{}': {}", config.endpoint, e)))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ProviderError::ConnectionError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            endpoint,
            model: config.model.clone(),
            system_prompt: config.system_prompt.clone(),
            temperature: config.temperature,
        })
    }

    fn api_url(&self, path: &str) -> Result<Url, ProviderError> {
        self.endpoint
            .join(path)
            .map_err(|e| ProviderError::RequestFailed(format!("Invalid API path '{}': {}", path, e)))
    }

    /// Start a request carrying the API key header
    fn request(&self, method: Method, url: impl IntoUrl) -> RequestBuilder {
        self.client
            .request(method, url)
            .header(API_KEY_HEADER, &self.api_key)
    }

    /// Poll an uploaded file until the service finished processing it
    async fn wait_until_active(&self, file: UploadedFile) -> Result<UploadedFile, ProviderError> {
        let mut file = file;
        for _ in 0..FILE_POLL_ATTEMPTS {
            match file.state.as_deref() {
                Some("PROCESSING") => {
                    tokio::time::sleep(FILE_POLL_INTERVAL).await;
                    let url = self.api_url(&format!("v1beta/{}", file.name))?;
                    let response = self.request(Method::GET, url).send().await.map_err(request_error)?;
                    file = check_response(response)
                        .await?
                        .json::<UploadedFile>()
                        .await
                        .map_err(|e| ProviderError::ParseError(format!("File status: {}", e)))?;
                }
                Some("FAILED") => {
                    return Err(ProviderError::RequestFailed(format!("Processing of {} failed", file.name)));
                }
                _ => return Ok(file),
            }
        }
        Err(ProviderError::RequestFailed(format!("File {} is still processing", file.name)))
    }
}

#[async_trait]
impl Transcriber for Gemini {
    async fn upload(&self, segment: &AudioSegment) -> Result<RemoteFile, ProviderError> {
        let audio = segment
            .to_wav_bytes()
            .map_err(|e| ProviderError::RequestFailed(format!("Failed to encode segment {}: {}", segment.index, e)))?;

        let start = self
            .request(Method::POST, self.api_url("upload/v1beta/files")?)
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", audio.len().to_string())
            .header("X-Goog-Upload-Header-Content-Type", WAV_MIME_TYPE)
            .json(&json!({ "file": { "display_name": format!("segment-{}", segment.index) } }))
            .send()
            .await
            .map_err(request_error)?;
        let start = check_response(start).await?;

        let upload_url = start
            .headers()
            .get("x-goog-upload-url")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| ProviderError::ParseError("Upload session did not return an upload URL".to_string()))?;

        let response = self
            .request(Method::POST, &upload_url)
            .header("X-Goog-Upload-Offset", "0")
            .header("X-Goog-Upload-Command", "upload, finalize")
            .body(audio)
            .send()
            .await
            .map_err(request_error)?;
        let uploaded = check_response(response)
            .await?
            .json::<UploadResponse>()
            .await
            .map_err(|e| ProviderError::ParseError(format!("Upload response: {}", e)))?;

        let file = self.wait_until_active(uploaded.file).await?;
        debug!("Segment {} uploaded as {}", segment.index, file.name);

        Ok(RemoteFile {
            name: file.name,
            uri: file.uri,
            mime_type: file.mime_type.unwrap_or_else(|| WAV_MIME_TYPE.to_string()),
        })
    }

    async fn transcribe(&self, file: &RemoteFile) -> Result<Vec<SubtitleEntry>, ProviderError> {
        let request = GenerateContentRequest::for_audio(file, &self.system_prompt, self.temperature);
        let url = self.api_url(&format!("v1beta/models/{}:generateContent", self.model))?;

        debug!("Asking {} to transcribe {}", self.model, file.name);
        let response = self
            .request(Method::POST, url)
            .json(&request)
            .send()
            .await
            .map_err(request_error)?;

        let response = check_response(response)
            .await?
            .json::<GenerateContentResponse>()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        if let Some(usage) = &response.usage_metadata {
            debug!(
                "Token usage: prompt {:?}, output {:?}, thoughts {:?}, cached {:?}",
                usage.prompt_token_count,
                usage.candidates_token_count,
                usage.thoughts_token_count,
                usage.cached_content_token_count
            );
        }

        parse_transcript(&response)
    }

    async fn delete(&self, file: &RemoteFile) -> Result<(), ProviderError> {
        let url = self.api_url(&format!("v1beta/{}", file.name))?;
        let response = self.request(Method::DELETE, url).send().await.map_err(request_error)?;
        check_response(response).await?;
        debug!("Removed uploaded file {}", file.name);
        Ok(())
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Map a transport failure, dropping the request URL from the message
fn request_error(error: reqwest::Error) -> ProviderError {
    let error = error.without_url();
    if error.is_timeout() || error.is_connect() {
        ProviderError::ConnectionError(error.to_string())
    } else {
        ProviderError::RequestFailed(error.to_string())
    }
}

/// Turn a non-success response into a structured API error
async fn check_response(response: Response) -> Result<Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Failed to get error response text".to_string());
    let error = parse_api_error(status.as_u16(), &body);
    warn!("Gemini API error: {}", error);
    Err(error)
}

/// Parse an error body, wrapped (`{"error": {...}}`) or flat
pub fn parse_api_error(status_code: u16, body: &str) -> ProviderError {
    let envelope = match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => envelope,
        Err(_) => {
            return ProviderError::ApiError {
                status_code,
                status: String::new(),
                message: body.trim().chars().take(500).collect(),
                details: ApiErrorDetails::default(),
            };
        }
    };

    match envelope.error {
        Some(error) => ProviderError::ApiError {
            status_code,
            status: error.status.unwrap_or_default(),
            message: error.message.unwrap_or_default(),
            details: parse_error_details(&error.details),
        },
        None => ProviderError::ApiError {
            status_code,
            status: envelope.status.unwrap_or_default(),
            message: envelope.message.unwrap_or_default(),
            details: ApiErrorDetails::default(),
        },
    }
}

fn parse_error_details(details: &[Value]) -> ApiErrorDetails {
    let mut parsed = ApiErrorDetails::default();

    for detail in details {
        let detail_type = detail.get("@type").and_then(|t| t.as_str()).unwrap_or_default();
        if detail_type.ends_with("QuotaFailure") {
            if let Some(violations) = detail.get("violations").and_then(|v| v.as_array()) {
                parsed.quota_violations.extend(violations.iter().map(|v| QuotaViolation {
                    quota_metric: v.get("quotaMetric").and_then(|m| m.as_str()).unwrap_or_default().to_string(),
                    quota_id: v.get("quotaId").and_then(|q| q.as_str()).unwrap_or_default().to_string(),
                }));
            }
        } else if detail_type.ends_with("RetryInfo") {
            parsed.retry_delay = detail.get("retryDelay").and_then(|d| d.as_str()).map(str::to_string);
        }
    }

    parsed
}

/// Extract the subtitle list from a generateContent response
///
/// An explicit empty array is a valid transcript of a silent segment.
pub fn parse_transcript(response: &GenerateContentResponse) -> Result<Vec<SubtitleEntry>, ProviderError> {
    let candidate = response.candidates.first().ok_or(ProviderError::EmptyResponse)?;

    let text: String = candidate
        .content
        .as_ref()
        .map(|content| content.parts.iter().filter_map(|p| p.text.as_deref()).collect())
        .unwrap_or_default();

    let text = strip_code_fence(text.trim());
    if text.is_empty() {
        if let Some(reason) = &candidate.finish_reason {
            debug!("Empty candidate, finish reason {}", reason);
        }
        return Err(ProviderError::EmptyResponse);
    }

    serde_json::from_str::<Vec<SubtitleEntry>>(text)
        .map_err(|e| ProviderError::ParseError(format!("Transcript is not a subtitle list: {}", e)))
}

fn strip_code_fence(text: &str) -> &str {
    text.strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(text)
}
