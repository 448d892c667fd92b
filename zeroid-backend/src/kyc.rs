//! The KYC provider seam (§4.5 expansion). The distilled spec treats the
//! provider as an external collaborator; this crate only ships the trait a
//! real integration would implement, plus a deterministic stub for tests
//! and local development.

use zeroid_common::model::{KycResult, KycSubmission};

pub trait KycProvider: Send + Sync {
    fn verify(&self, submission: &KycSubmission) -> KycResult;
}

/// Rejects `fullName == "REJECT ME"` (§8 scenario 3); otherwise passes.
/// No network call, no real document verification — a fixed, deterministic
/// stand-in for whatever provider a deployment would actually plug in.
pub struct StubKycProvider;

impl KycProvider for StubKycProvider {
    fn verify(&self, submission: &KycSubmission) -> KycResult {
        let rejected = submission.full_name == "REJECT ME";
        KycResult {
            submission: submission.clone(),
            passed: !rejected,
            confidence: if rejected { 0.15 } else { 0.95 },
            provider_ref: format!("stub-{}", uuid::Uuid::new_v4()),
            verified_at_ms: crate::time::now_ms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zeroid_common::model::DocumentType;

    fn submission(full_name: &str) -> KycSubmission {
        KycSubmission {
            full_name: full_name.to_string(),
            date_of_birth: "1990-01-15".to_string(),
            country_code: 840,
            document_type: DocumentType::Passport,
            document_number: "X123".to_string(),
            bound_address: None,
            level: None,
        }
    }

    #[test]
    fn rejects_the_magic_name() {
        let result = StubKycProvider.verify(&submission("REJECT ME"));
        assert!(!result.passed);
        assert!((result.confidence - 0.15).abs() < 1e-9);
    }

    #[test]
    fn passes_anyone_else() {
        let result = StubKycProvider.verify(&submission("Alice Ng"));
        assert!(result.passed);
        assert!((result.confidence - 0.95).abs() < 1e-9);
    }
}
