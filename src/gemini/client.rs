use crate::backoff::InfraError;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Gemini REST endpoint root.
pub const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

const REQUEST_TIMEOUT_SECS: u64 = 180;

/// One piece of multimodal request content.
#[derive(Debug, Clone)]
pub enum Part {
    Text(String),
    Image { mime_type: String, data: Vec<u8> },
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text(text.into())
    }

    pub fn jpeg(data: Vec<u8>) -> Self {
        Part::Image {
            mime_type: "image/jpeg".to_string(),
            data,
        }
    }

    /// Read an image file, guessing its MIME type from the extension.
    pub async fn image_file(path: &Path) -> anyhow::Result<Self> {
        let data = tokio::fs::read(path)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to read image {}: {}", path.display(), e))?;
        Ok(Part::Image {
            mime_type: mime_for(path).to_string(),
            data,
        })
    }
}

pub fn mime_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("heic") => "image/heic",
        Some("gif") => "image/gif",
        _ => "image/jpeg",
    }
}

// ── wire types ──────────────────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<&'a GenerationConfig>,
}

#[derive(Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<WirePart>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum WirePart {
    Text { text: String },
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    #[serde(alias = "mime_type")]
    mime_type: String,
    data: String,
}

#[derive(Serialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub response_modalities: Vec<String>,
}

impl GenerationConfig {
    pub fn image(temperature: f32) -> Self {
        Self {
            temperature: Some(temperature),
            response_modalities: vec!["IMAGE".to_string()],
        }
    }
}

#[derive(Deserialize, Debug, Default)]
pub(crate) struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize, Debug)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Deserialize, Debug)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize, Debug)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default, rename = "inlineData", alias = "inline_data")]
    inline_data: Option<InlineData>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: String,
}

impl GenerateResponse {
    /// Concatenated text of the first candidate.
    pub(crate) fn text(&self) -> String {
        self.first_parts()
            .filter_map(|p| p.text.as_deref())
            .collect::<Vec<_>>()
            .join("")
    }

    /// First inline image of the first candidate, decoded.
    pub(crate) fn image(&self) -> Option<Vec<u8>> {
        self.first_parts()
            .filter_map(|p| p.inline_data.as_ref())
            .find_map(|inline| BASE64.decode(inline.data.as_bytes()).ok())
            .filter(|bytes| !bytes.is_empty())
    }

    fn first_parts(&self) -> impl Iterator<Item = &ResponsePart> {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| c.parts.iter())
            .into_iter()
            .flatten()
    }
}

// ── client ──────────────────────────────────────────────────────────────────

/// Thin `generateContent` client. One attempt per call; callers wrap it in a
/// [`crate::backoff::BackoffPolicy`].
#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create HTTP client: {}", e))?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            base_url: GEMINI_API_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub(crate) async fn generate(
        &self,
        model: &str,
        parts: &[Part],
        config: Option<&GenerationConfig>,
    ) -> Result<GenerateResponse, InfraError> {
        let body = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: parts.iter().map(to_wire).collect(),
            }],
            generation_config: config,
        };
        let url = format!("{}/models/{}:generateContent", self.base_url, model);

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(InfraError::from_reqwest)?;

        let status = response.status();
        let text = response.text().await.map_err(InfraError::from_reqwest)?;

        if !status.is_success() {
            let message = serde_json::from_str::<ApiErrorBody>(&text)
                .map(|body| body.error.message)
                .unwrap_or(text);
            return Err(InfraError::from_status(status.as_u16(), &message));
        }

        serde_json::from_str(&text).map_err(|e| {
            InfraError::Fatal(format!(
                "Failed to parse Gemini response: {} ({})",
                e,
                crate::util::truncate(&text, 200)
            ))
        })
    }

    pub async fn generate_text(&self, model: &str, parts: &[Part]) -> Result<String, InfraError> {
        Ok(self.generate(model, parts, None).await?.text())
    }

    /// `Ok(None)` when the model answered without an image part.
    pub async fn generate_image(
        &self,
        model: &str,
        parts: &[Part],
        temperature: f32,
    ) -> Result<Option<Vec<u8>>, InfraError> {
        let config = GenerationConfig::image(temperature);
        Ok(self.generate(model, parts, Some(&config)).await?.image())
    }
}

fn to_wire(part: &Part) -> WirePart {
    match part {
        Part::Text(text) => WirePart::Text { text: text.clone() },
        Part::Image { mime_type, data } => WirePart::Inline {
            inline_data: InlineData {
                mime_type: mime_type.clone(),
                data: BASE64.encode(data),
            },
        },
    }
}
