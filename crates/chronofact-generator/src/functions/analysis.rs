// SPDX-FileCopyrightText: 2026 Chronofact Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Misinformation detection and credibility assessment.

use serde_json::json;
use tokio::time::Instant;

use chronofact_core::error::ChronofactError;
use chronofact_core::types::{CredibilityAssessment, MisinformationAnalysis, ProviderMessage};

use crate::generate::{GenerationTask, StructuredGenerator};

const DETECT_SYSTEM: &str = "You analyze text for misinformation patterns: sensationalist \
    framing, unverifiable claims, fabricated statistics, impersonation, and manipulated urgency. \
    Classify conservatively; absence of evidence is not evidence of fabrication.";

const ASSESS_SYSTEM: &str = "You assess the credibility of social media claims from the text, \
    the author description, and engagement metrics. Weigh verifiability, specificity, source \
    reputation, and engagement anomalies.";

impl StructuredGenerator {
    /// Classify misinformation risk in a text.
    pub async fn detect_misinformation(
        &self,
        text: &str,
        deadline: Instant,
    ) -> Result<MisinformationAnalysis, ChronofactError> {
        let task = GenerationTask {
            name: "emit_misinformation_analysis".to_string(),
            description: "Return the misinformation analysis of the text.".to_string(),
            schema: json!({
                "type": "object",
                "properties": {
                    "is_suspicious": {"type": "boolean"},
                    "suspicious_patterns": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Named patterns detected in the text"
                    },
                    "risk_level": {"type": "string", "enum": ["low", "medium", "high"]},
                    "recommendation": {"type": "string"}
                },
                "required": ["is_suspicious", "suspicious_patterns", "risk_level", "recommendation"]
            }),
            system: Some(DETECT_SYSTEM.to_string()),
            messages: vec![ProviderMessage::user(format!("Analyze this text:\n\n{text}"))],
        };

        self.generate(&task, |_: &MisinformationAnalysis| Ok(()), deadline).await
    }

    /// Assess the credibility of a single claim or post.
    pub async fn assess_credibility(
        &self,
        text: &str,
        author: Option<&str>,
        engagement: Option<&str>,
        deadline: Instant,
    ) -> Result<CredibilityAssessment, ChronofactError> {
        let prompt = format!(
            "Post text:\n{text}\n\nAuthor: {}\nEngagement: {}",
            author.unwrap_or("Unknown"),
            engagement.unwrap_or("No engagement data"),
        );

        let task = GenerationTask {
            name: "emit_credibility_assessment".to_string(),
            description: "Return the credibility assessment of the post.".to_string(),
            schema: json!({
                "type": "object",
                "properties": {
                    "credibility_score": {
                        "type": "number",
                        "minimum": 0.0,
                        "maximum": 1.0
                    },
                    "factors": {"type": "array", "items": {"type": "string"}},
                    "reasoning": {"type": "string"},
                    "recommendation": {
                        "type": "string",
                        "enum": ["trust", "verify_further", "suspicious"]
                    }
                },
                "required": ["credibility_score", "factors", "reasoning", "recommendation"]
            }),
            system: Some(ASSESS_SYSTEM.to_string()),
            messages: vec![ProviderMessage::user(prompt)],
        };

        self.generate(
            &task,
            |assessment: &CredibilityAssessment| {
                if (0.0..=1.0).contains(&assessment.credibility_score) {
                    Ok(())
                } else {
                    Err(format!(
                        "credibility_score must be in [0, 1], got {}",
                        assessment.credibility_score
                    ))
                }
            },
            deadline,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::RateLimiter;
    use crate::testing::ScriptedProvider;
    use chronofact_core::types::{CredibilityVerdict, RiskLevel};
    use std::sync::Arc;
    use std::time::Duration;

    fn generator(provider: ScriptedProvider) -> StructuredGenerator {
        StructuredGenerator::new(
            Arc::new(provider),
            "test-model".into(),
            1024,
            Arc::new(RateLimiter::new(600)),
        )
    }

    fn deadline() -> Instant {
        Instant::now() + Duration::from_secs(10)
    }

    #[tokio::test]
    async fn detect_parses_risk_level() {
        let provider = ScriptedProvider::with_tool_inputs(vec![json!({
            "is_suspicious": true,
            "suspicious_patterns": ["fabricated statistics"],
            "risk_level": "high",
            "recommendation": "Cross-check against official sources."
        })]);
        let analysis = generator(provider)
            .detect_misinformation("shocking secret numbers", deadline())
            .await
            .unwrap();
        assert!(analysis.is_suspicious);
        assert_eq!(analysis.risk_level, RiskLevel::High);
        assert_eq!(analysis.suspicious_patterns.len(), 1);
    }

    #[tokio::test]
    async fn detect_rejects_unknown_risk_level() {
        let bad = json!({
            "is_suspicious": false,
            "suspicious_patterns": [],
            "risk_level": "catastrophic",
            "recommendation": "n/a"
        });
        let provider =
            ScriptedProvider::with_tool_inputs(vec![bad.clone(), bad.clone(), bad]);
        let err = generator(provider)
            .detect_misinformation("text", deadline())
            .await
            .unwrap_err();
        assert!(matches!(err, ChronofactError::SchemaViolation(_)));
    }

    #[tokio::test]
    async fn assess_validates_score_range() {
        let provider = ScriptedProvider::with_tool_inputs(vec![
            json!({
                "credibility_score": 1.7,
                "factors": [],
                "reasoning": "overconfident",
                "recommendation": "trust"
            }),
            json!({
                "credibility_score": 0.8,
                "factors": ["verified author"],
                "reasoning": "specific, sourced claim",
                "recommendation": "trust"
            }),
        ]);
        let assessment = generator(provider)
            .assess_credibility("claim", Some("verified reporter"), None, deadline())
            .await
            .unwrap();
        assert!((assessment.credibility_score - 0.8).abs() < 1e-9);
        assert_eq!(assessment.recommendation, CredibilityVerdict::Trust);
    }
}
