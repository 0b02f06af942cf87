use serde::{Deserialize, Serialize};

/// Coarse outcome classification returned with verification results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Recommendation {
    Allow,
    Challenge,
    Deny,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub session_id: String,
    pub status: String,
    pub recommendation: Recommendation,
    /// Opaque payload of verified identity attributes.
    #[serde(default)]
    pub verified_info: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceAuthResult {
    pub status: String,
    pub recommendation: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn verification_result_parses_recommendation() {
        let result: VerificationResult = serde_json::from_value(json!({
            "session_id": "S1",
            "status": "complete",
            "recommendation": "CHALLENGE",
            "verified_info": { "document": { "type": "passport" } }
        }))
        .unwrap();

        assert_eq!(result.recommendation, Recommendation::Challenge);
        assert_eq!(result.verified_info["document"]["type"], "passport");
    }

    #[test]
    fn missing_verified_info_defaults_to_null() {
        let result: VerificationResult = serde_json::from_value(json!({
            "session_id": "S1",
            "status": "complete",
            "recommendation": "ALLOW"
        }))
        .unwrap();

        assert!(result.verified_info.is_null());
    }

    #[test]
    fn unknown_recommendation_is_rejected() {
        let result: Result<VerificationResult, _> = serde_json::from_value(json!({
            "session_id": "S1",
            "status": "complete",
            "recommendation": "MAYBE"
        }));
        assert!(result.is_err());
    }
}
