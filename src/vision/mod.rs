//! Meal image analysis through a generative vision endpoint.
//!
//! The model is a black box: raw image in, structured suggestion out. A
//! malformed response fails that one request outright; there is no partial
//! parse, and nothing here ever touches a log cache.

use std::time::Duration;

use anyhow::{anyhow, Result};
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine as _;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

const MEAL_SCAN_TIMEOUT_SECONDS: u64 = 120;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

const MEAL_PROMPT: &str = r#"Analyze this food image and provide nutritional information.
Return ONLY a JSON object with the following fields:
{
    "food_name": "string",
    "calories": number,
    "protein_g": number,
    "carbs_g": number,
    "fats_g": number,
    "meal_type": "breakfast" | "lunch" | "dinner" | "snack",
    "food_group": "Proteins" | "Vegetables" | "Fruits" | "Grains" | "Dairy" | "Fats" | "Snacks" | "Beverages",
    "confidence": number (between 0 and 1)
}
Base the meal_type on the time of day if it's ambiguous, but prioritize the food items.
Be as accurate as possible with estimates."#;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MealAnalysis {
    pub food_name: String,
    pub calories: f64,
    pub protein_g: f64,
    pub carbs_g: f64,
    pub fats_g: f64,
    pub meal_type: String,
    pub food_group: String,
    pub confidence: f64,
}

pub trait MealVision: Send + Sync {
    fn analyze_meal_image(&self, image_bytes: &[u8], mime_type: &str) -> Result<MealAnalysis>;
}

/// First `{...}` block of the model's text. Models routinely wrap JSON in
/// fences or prose, so take everything from the first brace to the last.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

pub fn parse_meal_analysis(text: &str) -> Result<MealAnalysis> {
    let raw = extract_json_object(text)
        .ok_or_else(|| anyhow!("no JSON object in model response"))?;
    serde_json::from_str(raw).map_err(|err| anyhow!("malformed meal analysis response: {err}"))
}

#[derive(Debug, Deserialize)]
struct GeminiGenerateContentResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
struct GeminiGenerateContentRequest {
    contents: Vec<GeminiRequestContent>,
}

#[derive(Debug, Serialize)]
struct GeminiRequestContent {
    role: String,
    parts: Vec<GeminiRequestPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum GeminiRequestPart {
    Text {
        text: String,
    },
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: GeminiInlineData,
    },
}

#[derive(Debug, Serialize)]
struct GeminiInlineData {
    #[serde(rename = "mimeType")]
    mime_type: String,
    data: String,
}

pub fn generate_content_url(base_url: &str, model_name: &str, api_key: &str) -> String {
    format!(
        "{}/models/{}:generateContent?key={}",
        base_url.trim_end_matches('/'),
        model_name,
        api_key
    )
}

pub struct GeminiMealVision {
    client: Client,
    base_url: String,
    api_key: String,
    model_name: String,
}

impl GeminiMealVision {
    pub fn new(base_url: String, api_key: String, model_name: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
            api_key,
            model_name,
        }
    }
}

impl MealVision for GeminiMealVision {
    fn analyze_meal_image(&self, image_bytes: &[u8], mime_type: &str) -> Result<MealAnalysis> {
        let url = generate_content_url(&self.base_url, &self.model_name, &self.api_key);
        let req = GeminiGenerateContentRequest {
            contents: vec![GeminiRequestContent {
                role: "user".to_string(),
                parts: vec![
                    GeminiRequestPart::Text {
                        text: MEAL_PROMPT.to_string(),
                    },
                    GeminiRequestPart::Inline {
                        inline_data: GeminiInlineData {
                            mime_type: mime_type.to_string(),
                            data: B64.encode(image_bytes),
                        },
                    },
                ],
            }],
        };

        let resp = self
            .client
            .post(url)
            .json(&req)
            .timeout(Duration::from_secs(MEAL_SCAN_TIMEOUT_SECONDS))
            .send()?;

        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!("meal scan request failed: {status}"));
        }

        let body: GeminiGenerateContentResponse = resp.json()?;
        let text: String = body
            .candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        parse_meal_analysis(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"{
        "food_name": "Chicken salad",
        "calories": 420,
        "protein_g": 35,
        "carbs_g": 18,
        "fats_g": 22,
        "meal_type": "lunch",
        "food_group": "Proteins",
        "confidence": 0.87
    }"#;

    #[test]
    fn parses_a_bare_json_object() {
        let analysis = parse_meal_analysis(VALID).expect("parse");
        assert_eq!(analysis.food_name, "Chicken salad");
        assert_eq!(analysis.calories, 420.0);
        assert_eq!(analysis.meal_type, "lunch");
    }

    #[test]
    fn parses_json_wrapped_in_fences_and_prose() {
        let wrapped = format!("Here is the analysis:\n```json\n{VALID}\n```\nEnjoy!");
        let analysis = parse_meal_analysis(&wrapped).expect("parse");
        assert_eq!(analysis.confidence, 0.87);
    }

    #[test]
    fn missing_fields_are_a_hard_failure() {
        let partial = r#"{ "food_name": "Toast", "calories": 200 }"#;
        assert!(parse_meal_analysis(partial).is_err());
    }

    #[test]
    fn response_without_json_is_a_hard_failure() {
        assert!(parse_meal_analysis("I cannot identify this food.").is_err());
        assert!(parse_meal_analysis("").is_err());
    }

    #[test]
    fn generate_content_url_trims_trailing_slash() {
        assert_eq!(
            generate_content_url("https://example.com/v1beta/", "gemini-1.5-flash", "k"),
            "https://example.com/v1beta/models/gemini-1.5-flash:generateContent?key=k"
        );
    }
}
