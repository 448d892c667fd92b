//! Request body validation (§6). No regex/validator crate appears anywhere
//! in the retrieval corpus, so these checks are hand rolled character
//! scanners rather than pattern matching against a compiled `Regex`.

use zeroid_common::model::DocumentType;

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("dateOfBirth must match YYYY-MM-DD")]
    DateOfBirth,
    #[error("countryCode must be between 1 and 999")]
    CountryCode,
    #[error("documentType must be one of passport, drivers_license, national_id")]
    DocumentType,
    #[error("boundAddress must match 0x followed by 40 hex characters")]
    BoundAddress,
    #[error("level must be between 0 and 4")]
    Level,
    #[error("requirements must contain between 1 and 10 entries")]
    RequirementsLength,
    #[error("publicSignals must contain between 1 and 50 entries")]
    PublicSignalsLength,
    #[error("proofs must contain between 1 and 100 entries")]
    ProofsLength,
    #[error("requirement type must be one of age_gte, country_not, sanctions_clear, sybil_unique")]
    RequirementType,
}

/// `^\d{4}-\d{2}-\d{2}$`
pub fn validate_date_of_birth(value: &str) -> Result<(), ValidationError> {
    let bytes = value.as_bytes();
    let shape_ok = bytes.len() == 10
        && bytes[0..4].iter().all(u8::is_ascii_digit)
        && bytes[4] == b'-'
        && bytes[5..7].iter().all(u8::is_ascii_digit)
        && bytes[7] == b'-'
        && bytes[8..10].iter().all(u8::is_ascii_digit);
    if shape_ok {
        Ok(())
    } else {
        Err(ValidationError::DateOfBirth)
    }
}

pub fn validate_country_code(value: u16) -> Result<(), ValidationError> {
    if (1..=999).contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::CountryCode)
    }
}

pub fn validate_document_type(value: &str) -> Result<DocumentType, ValidationError> {
    match value {
        "passport" => Ok(DocumentType::Passport),
        "drivers_license" => Ok(DocumentType::DriversLicense),
        "national_id" => Ok(DocumentType::NationalId),
        _ => Err(ValidationError::DocumentType),
    }
}

/// `^0x[a-fA-F0-9]{40}$`
pub fn validate_bound_address(value: &str) -> Result<(), ValidationError> {
    let bytes = value.as_bytes();
    let shape_ok = bytes.len() == 42
        && bytes[0] == b'0'
        && bytes[1] == b'x'
        && bytes[2..].iter().all(|b| b.is_ascii_hexdigit());
    if shape_ok {
        Ok(())
    } else {
        Err(ValidationError::BoundAddress)
    }
}

pub fn validate_level(value: u8) -> Result<(), ValidationError> {
    if value <= 4 {
        Ok(())
    } else {
        Err(ValidationError::Level)
    }
}

pub fn validate_requirements_length(len: usize) -> Result<(), ValidationError> {
    if (1..=10).contains(&len) {
        Ok(())
    } else {
        Err(ValidationError::RequirementsLength)
    }
}

pub fn validate_public_signals_length(len: usize) -> Result<(), ValidationError> {
    if (1..=50).contains(&len) {
        Ok(())
    } else {
        Err(ValidationError::PublicSignalsLength)
    }
}

pub fn validate_proofs_length(len: usize) -> Result<(), ValidationError> {
    if (1..=100).contains(&len) {
        Ok(())
    } else {
        Err(ValidationError::ProofsLength)
    }
}

pub fn validate_requirement_type(value: &str) -> Result<(), ValidationError> {
    match value {
        "age_gte" | "country_not" | "sanctions_clear" | "sybil_unique" => Ok(()),
        _ => Err(ValidationError::RequirementType),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_well_formed_date() {
        assert!(validate_date_of_birth("1990-01-15").is_ok());
    }

    #[test]
    fn rejects_malformed_date() {
        assert!(validate_date_of_birth("1990/01/15").is_err());
        assert!(validate_date_of_birth("90-01-15").is_err());
        assert!(validate_date_of_birth("1990-01-1").is_err());
    }

    #[test]
    fn country_code_bounds() {
        assert!(validate_country_code(1).is_ok());
        assert!(validate_country_code(999).is_ok());
        assert!(validate_country_code(0).is_err());
        assert!(validate_country_code(1000).is_err());
    }

    #[test]
    fn document_type_enumeration() {
        assert!(validate_document_type("passport").is_ok());
        assert!(validate_document_type("drivers_license").is_ok());
        assert!(validate_document_type("national_id").is_ok());
        assert!(validate_document_type("id_card").is_err());
    }

    #[test]
    fn bound_address_shape() {
        assert!(validate_bound_address("0xabc0000000000000000000000000000000000001").is_ok());
        assert!(validate_bound_address("0xZZ00000000000000000000000000000000000001").is_err());
        assert!(validate_bound_address("abc0000000000000000000000000000000000001").is_err());
        assert!(validate_bound_address("0xabc").is_err());
    }

    #[test]
    fn level_bounds() {
        assert!(validate_level(0).is_ok());
        assert!(validate_level(4).is_ok());
        assert!(validate_level(5).is_err());
    }

    #[test]
    fn requirements_length_bounds() {
        assert!(validate_requirements_length(1).is_ok());
        assert!(validate_requirements_length(10).is_ok());
        assert!(validate_requirements_length(0).is_err());
        assert!(validate_requirements_length(11).is_err());
    }

    #[test]
    fn public_signals_length_bounds() {
        assert!(validate_public_signals_length(1).is_ok());
        assert!(validate_public_signals_length(50).is_ok());
        assert!(validate_public_signals_length(0).is_err());
        assert!(validate_public_signals_length(51).is_err());
    }

    #[test]
    fn proofs_length_bounds() {
        assert!(validate_proofs_length(1).is_ok());
        assert!(validate_proofs_length(100).is_ok());
        assert!(validate_proofs_length(0).is_err());
        assert!(validate_proofs_length(101).is_err());
    }

    #[test]
    fn requirement_type_enumeration() {
        assert!(validate_requirement_type("age_gte").is_ok());
        assert!(validate_requirement_type("country_not").is_ok());
        assert!(validate_requirement_type("sanctions_clear").is_ok());
        assert!(validate_requirement_type("sybil_unique").is_ok());
        assert!(validate_requirement_type("bogus").is_err());
    }
}
