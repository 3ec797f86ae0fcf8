//! Structured description of the user's photo, produced once per job.

use crate::parse::null_as_default;
use serde::{Deserialize, Serialize};

const UNKNOWN: &str = "unknown";
const DEFAULT_SEARCH_QUERY: &str = "professional portrait photography";
const DEFAULT_STYLE: &str = "casual_iphone";

fn unknown() -> String {
    UNKNOWN.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lighting {
    #[serde(default = "unknown")]
    pub quality: String,
    #[serde(default = "unknown")]
    pub direction: String,
    #[serde(default = "unknown")]
    pub color_temp: String,
}

impl Default for Lighting {
    fn default() -> Self {
        Self {
            quality: unknown(),
            direction: unknown(),
            color_temp: unknown(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoAnalysis {
    #[serde(default = "unknown")]
    pub gender: String,
    #[serde(default = "unknown")]
    pub age_range: String,
    #[serde(default = "unknown")]
    pub pose: String,
    #[serde(default = "unknown")]
    pub setting: String,
    #[serde(default)]
    pub lighting: Lighting,
    #[serde(default = "unknown")]
    pub clothing: String,
    #[serde(default = "unknown")]
    pub expression: String,
    #[serde(default = "unknown")]
    pub background: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub issues: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub search_query: Option<String>,
    #[serde(default)]
    pub style_category: Option<String>,
}

impl Default for PhotoAnalysis {
    /// The "nothing known" analysis used when the model's answer is unusable.
    fn default() -> Self {
        Self {
            gender: unknown(),
            age_range: unknown(),
            pose: unknown(),
            setting: unknown(),
            lighting: Lighting::default(),
            clothing: unknown(),
            expression: unknown(),
            background: unknown(),
            issues: Vec::new(),
            strengths: Vec::new(),
            search_query: Some(DEFAULT_SEARCH_QUERY.to_string()),
            style_category: Some(DEFAULT_STYLE.to_string()),
        }
    }
}

impl PhotoAnalysis {
    /// Query for reference photos. Vibe mode searches the vibe itself;
    /// otherwise the model's own suggestion is preferred.
    pub fn reference_query(&self, vibe: Option<&str>) -> String {
        if let Some(vibe) = vibe {
            let gender = if self.gender == UNKNOWN { "" } else { self.gender.as_str() };
            return collapse_spaces(&format!(
                "professional portrait {} {} photography",
                vibe.replace('_', " "),
                gender
            ));
        }

        match self.search_query.as_deref().map(str::trim) {
            Some(query) if !query.is_empty() => query.to_string(),
            _ => collapse_spaces(&format!("professional portrait {} photography", self.setting)),
        }
    }

    /// One-line description stored alongside learned prompts.
    pub fn describe(&self) -> String {
        format!(
            "{} {}, {}, {} lighting, {}",
            self.pose, self.setting, self.expression, self.lighting.quality, self.clothing
        )
    }
}

/// Scout analysis, well-formed by construction.
#[derive(Debug, Clone, PartialEq)]
pub enum Analyzed {
    Parsed(PhotoAnalysis),
    /// The model's answer was unusable; the unknown-filled default was used
    Defaulted { reason: String },
}

impl Analyzed {
    pub fn from_response(response: &str) -> Self {
        match crate::parse::parse_json_object::<PhotoAnalysis>(response) {
            Ok(analysis) => Analyzed::Parsed(analysis),
            Err(err) => {
                tracing::warn!(error = %err, "photo analysis unusable, continuing with defaults");
                Analyzed::Defaulted {
                    reason: err.to_string(),
                }
            }
        }
    }

    pub fn into_analysis(self) -> PhotoAnalysis {
        match self {
            Analyzed::Parsed(analysis) => analysis,
            Analyzed::Defaulted { .. } => PhotoAnalysis::default(),
        }
    }
}

fn collapse_spaces(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_analysis() {
        let response = r#"```json
        {
            "gender": "female",
            "pose": "sitting",
            "setting": "indoor cafe",
            "lighting": {"quality": "dim", "direction": "side", "color_temp": "warm"},
            "issues": ["underexposed"],
            "search_query": "cafe portrait natural window light",
            "style_category": "emotional_film"
        }
        ```"#;
        let analysis = Analyzed::from_response(response).into_analysis();
        assert_eq!(analysis.setting, "indoor cafe");
        assert_eq!(analysis.lighting.quality, "dim");
        assert_eq!(analysis.expression, "unknown");
        assert_eq!(analysis.reference_query(None), "cafe portrait natural window light");
    }

    #[test]
    fn null_lists_keep_the_analysis() {
        let analyzed = Analyzed::from_response(
            r#"{"gender": "male", "issues": null, "strengths": null}"#,
        );
        assert!(matches!(analyzed, Analyzed::Parsed(_)));
        let analysis = analyzed.into_analysis();
        assert_eq!(analysis.gender, "male");
        assert!(analysis.issues.is_empty());
        assert!(analysis.strengths.is_empty());
    }

    #[test]
    fn garbage_falls_back_to_unknown_defaults() {
        let analyzed = Analyzed::from_response("no json here");
        assert!(matches!(analyzed, Analyzed::Defaulted { .. }));
        let analysis = analyzed.into_analysis();
        assert_eq!(analysis.setting, "unknown");
        assert_eq!(analysis.style_category.as_deref(), Some("casual_iphone"));
        assert_eq!(analysis.reference_query(None), "professional portrait photography");
    }

    #[test]
    fn vibe_query_uses_vibe_and_gender() {
        let analysis = PhotoAnalysis {
            gender: "male".into(),
            ..PhotoAnalysis::default()
        };
        assert_eq!(
            analysis.reference_query(Some("coffee_shop")),
            "professional portrait coffee shop male photography"
        );
        assert_eq!(
            PhotoAnalysis::default().reference_query(Some("outdoors")),
            "professional portrait outdoors photography"
        );
    }

    #[test]
    fn missing_search_query_uses_setting() {
        let analysis = PhotoAnalysis {
            setting: "street".into(),
            search_query: None,
            ..PhotoAnalysis::default()
        };
        assert_eq!(analysis.reference_query(None), "professional portrait street photography");
    }
}
