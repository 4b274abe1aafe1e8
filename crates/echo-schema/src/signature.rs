use echo_types::ObjectType;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Field every signed protocol object carries.
pub const SIGNATURE_FIELD: &str = "signature";

/// Substituted for a missing signature when checks are skipped, so schemas
/// that require the field still validate the rest of the object.
pub const PLACEHOLDER_SIGNATURE: &str = "TEST_SIGNATURE";

/// Whether callers may bypass signature checks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignaturePolicy {
    #[serde(default)]
    pub require_signature: bool,
}

/// A request tried to skip signature checks under a strict policy.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("signature required: '{operation}' may not skip signature checks")]
pub struct SignaturePolicyViolation {
    pub operation: String,
}

impl SignaturePolicy {
    /// Policy that rejects `skip_signature = true`.
    pub fn strict() -> Self {
        Self {
            require_signature: true,
        }
    }

    /// Reject a skip request under a strict policy. Called before any
    /// validation or storage effect.
    pub fn enforce(&self, operation: &str, skip_signature: bool) -> Result<(), SignaturePolicyViolation> {
        if self.require_signature && skip_signature {
            tracing::warn!(operation, "signature skip rejected by policy");
            return Err(SignaturePolicyViolation {
                operation: operation.to_string(),
            });
        }
        Ok(())
    }
}

/// Outcome of a signature check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SignatureCheck {
    Accepted,
    Rejected { reason: String },
}

impl SignatureCheck {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}

/// Pluggable signature verification.
///
/// The node never implements signature algorithms itself; an adapter that
/// knows the key material installs one of these.
pub trait SignatureVerifier: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Check the signature carried by `object`.
    fn verify(&self, object_type: ObjectType, object: &Value) -> SignatureCheck;
}

/// Non-blank string signature on `object`, if any.
pub(crate) fn signature_of(object: &Value) -> Option<&str> {
    object
        .get(SIGNATURE_FIELD)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn lenient_policy_allows_skip() {
        let policy = SignaturePolicy::default();
        assert!(policy.enforce("store", true).is_ok());
        assert!(policy.enforce("store", false).is_ok());
    }

    #[test]
    fn strict_policy_rejects_skip() {
        let policy = SignaturePolicy::strict();
        let err = policy.enforce("import", true).unwrap_err();
        assert_eq!(err.operation, "import");
        assert!(err.to_string().contains("import"));
        assert!(policy.enforce("import", false).is_ok());
    }

    #[test]
    fn blank_signature_is_absent() {
        assert_eq!(signature_of(&json!({ "signature": "abc" })), Some("abc"));
        assert_eq!(signature_of(&json!({ "signature": "  " })), None);
        assert_eq!(signature_of(&json!({ "signature": 5 })), None);
        assert_eq!(signature_of(&json!({})), None);
    }

    #[test]
    fn policy_from_toml_style_json() {
        let p: SignaturePolicy = serde_json::from_value(json!({})).unwrap();
        assert!(!p.require_signature);
        let p: SignaturePolicy = serde_json::from_value(json!({ "require_signature": true })).unwrap();
        assert_eq!(p, SignaturePolicy::strict());
    }
}
