//! Quality gate for generated images.
//!
//! The evaluating model returns a score card that may carry its own verdict.
//! That verdict is ignored: [`QualityGate::decide`] always recomputes PASS/FAIL
//! from `overall` and `ai_detection_risk` against the configured thresholds.

use crate::config::Config;
use crate::parse::null_as_default;
use serde::{Deserialize, Deserializer, Serialize};

/// Highest value on the 1-10 scoring scale.
pub const SCORE_MAX: f64 = 10.0;

/// Scores from the independent evaluator, 1-10 each.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreCard {
    #[serde(default, deserialize_with = "null_as_default")]
    pub realism: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub identity_match: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub naturalness: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub attractiveness: f64,
    /// 1 = looks real, 10 = obviously AI
    #[serde(default = "worst_detection_risk", deserialize_with = "null_as_worst_risk")]
    pub ai_detection_risk: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub enhancement_quality: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub overall: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub issues: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub fix_suggestions: Vec<String>,
    /// Whatever verdict the evaluator claimed. Informational only.
    #[serde(default, rename = "verdict", skip_serializing)]
    pub reported_verdict: Option<String>,
}

fn worst_detection_risk() -> f64 {
    SCORE_MAX
}

fn null_as_worst_risk<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(SCORE_MAX))
}

impl ScoreCard {
    /// Scores substituted when the evaluator's answer can't be parsed.
    pub fn pessimistic() -> Self {
        Self {
            realism: 0.0,
            identity_match: 0.0,
            naturalness: 0.0,
            attractiveness: 0.0,
            ai_detection_risk: SCORE_MAX,
            enhancement_quality: 0.0,
            overall: 0.0,
            issues: vec!["Quality check response was not valid JSON".to_string()],
            fix_suggestions: vec!["Re-generate with stronger realism instructions".to_string()],
            reported_verdict: None,
        }
    }
}

/// Evaluator output, well-formed by construction.
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    /// The evaluator returned a parseable score card
    Scored(ScoreCard),
    /// The evaluator's answer was unusable; pessimistic scores were substituted
    Defaulted { scores: ScoreCard, reason: String },
}

impl Evaluation {
    /// Parse an evaluator response, substituting pessimistic scores on failure.
    pub fn from_response(response: &str) -> Self {
        match crate::parse::parse_json_object::<ScoreCard>(response) {
            Ok(scores) => Evaluation::Scored(scores),
            Err(err) => {
                tracing::warn!(error = %err, "evaluator response unusable, assuming worst scores");
                Evaluation::Defaulted {
                    scores: ScoreCard::pessimistic(),
                    reason: err.to_string(),
                }
            }
        }
    }

    pub fn scores(&self) -> &ScoreCard {
        match self {
            Evaluation::Scored(scores) => scores,
            Evaluation::Defaulted { scores, .. } => scores,
        }
    }

    pub fn is_defaulted(&self) -> bool {
        matches!(self, Evaluation::Defaulted { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Pass,
    Fail,
}

impl Verdict {
    pub fn is_pass(&self) -> bool {
        matches!(self, Verdict::Pass)
    }
}

/// Outcome of gating one evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct GateDecision {
    pub verdict: Verdict,
    pub overall: f64,
    pub ai_detection_risk: f64,
    /// Fix suggestions followed by issues, in order, repeats kept
    pub fix_inputs: Vec<String>,
}

/// Pass/fail thresholds on the 1-10 scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityGate {
    pub quality_threshold: f64,
    pub ai_detection_max: f64,
}

impl Default for QualityGate {
    fn default() -> Self {
        Self {
            quality_threshold: 7.0,
            ai_detection_max: 3.0,
        }
    }
}

impl QualityGate {
    pub fn new(quality_threshold: f64, ai_detection_max: f64) -> Self {
        Self {
            quality_threshold,
            ai_detection_max,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.quality_threshold, config.ai_detection_max)
    }

    /// PASS iff `overall >= quality_threshold` and
    /// `ai_detection_risk <= ai_detection_max`. NaN scores fail.
    pub fn decide(&self, evaluation: &Evaluation) -> GateDecision {
        let scores = evaluation.scores();
        let passes = scores.overall >= self.quality_threshold
            && scores.ai_detection_risk <= self.ai_detection_max;

        let fix_inputs = scores
            .fix_suggestions
            .iter()
            .chain(scores.issues.iter())
            .cloned()
            .collect();

        GateDecision {
            verdict: if passes { Verdict::Pass } else { Verdict::Fail },
            overall: scores.overall,
            ai_detection_risk: scores.ai_detection_risk,
            fix_inputs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(overall: f64, risk: f64) -> Evaluation {
        Evaluation::Scored(ScoreCard {
            overall,
            ai_detection_risk: risk,
            ..ScoreCard::pessimistic()
        })
    }

    #[test]
    fn passes_at_inclusive_boundaries() {
        let gate = QualityGate::default();
        assert_eq!(gate.decide(&card(7.0, 3.0)).verdict, Verdict::Pass);
        assert_eq!(gate.decide(&card(10.0, 1.0)).verdict, Verdict::Pass);
    }

    #[test]
    fn fails_just_outside_boundaries() {
        let gate = QualityGate::default();
        assert_eq!(gate.decide(&card(6.99, 1.0)).verdict, Verdict::Fail);
        assert_eq!(gate.decide(&card(9.0, 3.01)).verdict, Verdict::Fail);
        assert_eq!(gate.decide(&card(f64::NAN, 1.0)).verdict, Verdict::Fail);
    }

    #[test]
    fn grid_matches_rule() {
        let gate = QualityGate::default();
        for overall in 0..=10 {
            for risk in 0..=10 {
                let expected = overall >= 7 && risk <= 3;
                let decision = gate.decide(&card(overall as f64, risk as f64));
                assert_eq!(decision.verdict.is_pass(), expected, "{overall}/{risk}");
            }
        }
    }

    #[test]
    fn reported_verdict_is_ignored() {
        let gate = QualityGate::default();
        let claimed_pass = Evaluation::from_response(
            r#"{"overall": 5, "ai_detection_risk": 2, "verdict": "PASS"}"#,
        );
        assert_eq!(claimed_pass.scores().reported_verdict.as_deref(), Some("PASS"));
        assert_eq!(gate.decide(&claimed_pass).verdict, Verdict::Fail);

        let claimed_fail = Evaluation::from_response(
            r#"{"overall": 8, "ai_detection_risk": 2, "verdict": "FAIL"}"#,
        );
        assert_eq!(gate.decide(&claimed_fail).verdict, Verdict::Pass);
    }

    #[test]
    fn custom_thresholds_apply() {
        let strict = QualityGate::new(9.0, 1.0);
        assert_eq!(strict.decide(&card(8.5, 1.0)).verdict, Verdict::Fail);
        assert_eq!(strict.decide(&card(9.0, 1.0)).verdict, Verdict::Pass);
    }

    #[test]
    fn fix_inputs_keep_order_and_repeats() {
        let evaluation = Evaluation::Scored(ScoreCard {
            overall: 4.0,
            ai_detection_risk: 6.0,
            issues: vec!["skin too smooth".into(), "six fingers".into()],
            fix_suggestions: vec!["add pores".into(), "skin too smooth".into()],
            ..ScoreCard::pessimistic()
        });
        let decision = QualityGate::default().decide(&evaluation);
        assert_eq!(
            decision.fix_inputs,
            vec!["add pores", "skin too smooth", "skin too smooth", "six fingers"]
        );
    }

    #[test]
    fn unparseable_response_becomes_pessimistic_fail() {
        let evaluation = Evaluation::from_response("Sorry, I can't help with that.");
        assert!(evaluation.is_defaulted());
        assert_eq!(evaluation.scores().overall, 0.0);
        assert_eq!(evaluation.scores().ai_detection_risk, SCORE_MAX);

        let decision = QualityGate::default().decide(&evaluation);
        assert_eq!(decision.verdict, Verdict::Fail);
        assert_eq!(
            decision.fix_inputs,
            vec![
                "Re-generate with stronger realism instructions",
                "Quality check response was not valid JSON"
            ]
        );
    }

    #[test]
    fn null_lists_do_not_spoil_a_passing_card() {
        let evaluation = Evaluation::from_response(
            r#"{"overall": 9, "ai_detection_risk": 1, "issues": [], "fix_suggestions": null}"#,
        );
        assert!(!evaluation.is_defaulted());
        assert!(evaluation.scores().fix_suggestions.is_empty());

        let decision = QualityGate::default().decide(&evaluation);
        assert_eq!(decision.verdict, Verdict::Pass);
        assert!(decision.fix_inputs.is_empty());
    }

    #[test]
    fn null_scores_read_as_failing_values() {
        let evaluation = Evaluation::from_response(
            r#"{"overall": null, "ai_detection_risk": null, "issues": null, "realism": null}"#,
        );
        assert!(!evaluation.is_defaulted());
        assert_eq!(evaluation.scores().overall, 0.0);
        assert_eq!(evaluation.scores().ai_detection_risk, SCORE_MAX);
        assert_eq!(QualityGate::default().decide(&evaluation).verdict, Verdict::Fail);
    }

    #[test]
    fn missing_fields_default_to_failing_values() {
        let evaluation = Evaluation::from_response(r#"{"realism": 9}"#);
        assert!(!evaluation.is_defaulted());
        assert_eq!(evaluation.scores().overall, 0.0);
        assert_eq!(evaluation.scores().ai_detection_risk, SCORE_MAX);
    }
}
