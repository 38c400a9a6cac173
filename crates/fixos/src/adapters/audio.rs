use anyhow::{anyhow, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

/// Instruction sent alongside the recording to the multimodal model. The
/// model is asked for a strict JSON object matching [`AudioAnalysis`].
const ANALYSIS_PROMPT: &str = r#"You are an expert diagnostic AI specializing in identifying problems from audio recordings of phones and vehicles.

Analyze this audio recording and identify any issues. The audio could be from vehicles (cars, motorcycles, trucks) or mobile devices (phones, tablets).

First determine WHAT is making the sound (phone or vehicle), then diagnose the problem.

Respond in this exact JSON format (no markdown, just raw JSON):
{
  "detected": true or false,
  "sourceType": "vehicle" | "phone" | "unknown",
  "sourceDetails": "Specific device identified (e.g., 'Android phone speaker', 'Car engine')",
  "issueType": "grinding" | "squeaking" | "rattling" | "clicking" | "humming" | "muffled" | "distortion" | "buzzing" | "crackling" | "none",
  "issue": "Brief description of the detected issue",
  "confidence": number between 0-100,
  "severity": "low" | "medium" | "high",
  "suggestedGuide": "Name of the suggested repair guide",
  "details": "Detailed explanation of what you heard and why it indicates this issue",
  "urgency": "Brief statement about how urgently this should be addressed"
}

Vehicle sounds: grinding suggests worn brake pads or CV joints; squeaking suggests belts or bushings; rattling suggests loose heat shields or exhaust; clicking suggests CV joints or bearings; humming suggests wheel bearings or tires.

Phone speaker issues: muffled suggests cone damage or debris; distortion suggests a blown speaker; crackling suggests a damaged membrane or loose wiring; buzzing suggests interference or loose components.

If no concerning sounds are detected, set "detected" to false and "issueType" to "none". Be accurate and conservative - only report issues you can genuinely detect from the audio."#;

/// The diagnostic verdict for one recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioAnalysis {
    #[serde(default)]
    pub detected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_details: Option<String>,
    #[serde(default)]
    pub issue_type: String,
    #[serde(default)]
    pub issue: String,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub severity: String,
    #[serde(default)]
    pub suggested_guide: String,
    #[serde(default)]
    pub details: String,
    #[serde(default)]
    pub urgency: String,
}

impl AudioAnalysis {
    /// The fixed low-confidence verdict used when the model's output cannot
    /// be parsed. Degraded but schema-valid, never an error to the user.
    pub fn inconclusive() -> Self {
        AudioAnalysis {
            detected: false,
            source_type: None,
            source_details: None,
            issue_type: "none".to_string(),
            issue: "Could not analyze audio clearly".to_string(),
            confidence: 0.0,
            severity: "low".to_string(),
            suggested_guide: String::new(),
            details: "The audio analysis was inconclusive. Please try recording again with clearer audio.".to_string(),
            urgency: "Try recording in a quieter environment".to_string(),
        }
    }
}

/// Client for the multimodal audio-analysis endpoint.
#[derive(Clone)]
pub struct AudioAnalyzer {
    client: Client,
    host: String,
    model: String,
    api_key: String,
}

impl AudioAnalyzer {
    pub fn new<H, M, K>(host: H, model: M, api_key: K) -> Result<Self>
    where
        H: Into<String>,
        M: Into<String>,
        K: Into<String>,
    {
        let client = Client::builder().timeout(Duration::from_secs(60)).build()?;
        Ok(Self {
            client,
            host: host.into(),
            model: model.into(),
            api_key: api_key.into(),
        })
    }

    /// Submit a recording for analysis. Upstream transport or HTTP failures
    /// are errors; output the model produced but which does not parse as
    /// the expected object degrades to [`AudioAnalysis::inconclusive`].
    pub async fn analyze(&self, audio: &[u8], mime_type: &str) -> Result<AudioAnalysis> {
        let payload = json!({
            "contents": [{
                "role": "user",
                "parts": [
                    {
                        "inlineData": {
                            "mimeType": mime_type,
                            "data": BASE64.encode(audio),
                        }
                    },
                    { "text": ANALYSIS_PROMPT }
                ]
            }]
        });

        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.host.trim_end_matches('/'),
            self.model
        );

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "audio analysis request failed: {}",
                response.status()
            ));
        }

        let body: Value = response.json().await?;
        let text = body["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .unwrap_or_default();

        Ok(parse_analysis(text))
    }
}

/// Parse the model's reply, tolerating Markdown code fences around the
/// JSON object.
fn parse_analysis(text: &str) -> AudioAnalysis {
    let cleaned = text.replace("```json", "").replace("```", "");
    serde_json::from_str(cleaned.trim()).unwrap_or_else(|_| AudioAnalysis::inconclusive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn gemini_body(text: &str) -> Value {
        json!({
            "candidates": [{
                "content": { "parts": [{ "text": text }] }
            }]
        })
    }

    async fn setup(response: ResponseTemplate) -> (MockServer, AudioAnalyzer) {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.5-flash-lite:generateContent"))
            .respond_with(response)
            .mount(&server)
            .await;

        let analyzer =
            AudioAnalyzer::new(server.uri(), "gemini-2.5-flash-lite", "test-key").unwrap();
        (server, analyzer)
    }

    #[tokio::test]
    async fn test_analyze_parses_fenced_json() {
        let text = "```json\n{\"detected\": true, \"issueType\": \"grinding\", \"issue\": \"Worn brake pads\", \"confidence\": 82, \"severity\": \"high\", \"suggestedGuide\": \"Brake Pad Replacement\", \"details\": \"Metallic grinding\", \"urgency\": \"Soon\"}\n```";
        let (_server, analyzer) =
            setup(ResponseTemplate::new(200).set_body_json(gemini_body(text))).await;

        let analysis = analyzer.analyze(b"audio-bytes", "audio/webm").await.unwrap();
        assert!(analysis.detected);
        assert_eq!(analysis.issue_type, "grinding");
        assert_eq!(analysis.confidence, 82.0);
    }

    #[tokio::test]
    async fn test_analyze_falls_back_on_unparseable_output() {
        let (_server, analyzer) = setup(
            ResponseTemplate::new(200).set_body_json(gemini_body("I heard a grinding noise.")),
        )
        .await;

        let analysis = analyzer.analyze(b"audio-bytes", "audio/webm").await.unwrap();
        assert_eq!(analysis, AudioAnalysis::inconclusive());
    }

    #[tokio::test]
    async fn test_analyze_errors_on_upstream_failure() {
        let (_server, analyzer) = setup(ResponseTemplate::new(503)).await;
        let err = analyzer.analyze(b"audio-bytes", "audio/webm").await;
        assert!(err.is_err());
    }

    #[test]
    fn test_inconclusive_is_low_confidence() {
        let analysis = AudioAnalysis::inconclusive();
        assert!(!analysis.detected);
        assert_eq!(analysis.confidence, 0.0);
        assert_eq!(analysis.issue_type, "none");
    }
}
