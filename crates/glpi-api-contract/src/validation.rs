// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Construction-time validation for request-shaping types

use validator::Validate;

use crate::criteria::Criterion;
use crate::error::ApiContractError;
use crate::types::DocumentUpload;

/// Validate a document upload descriptor
pub fn validate_document_upload(upload: &DocumentUpload) -> Result<(), ApiContractError> {
    upload.validate()?;
    Ok(())
}

/// Validate a criteria tree before flattening.
///
/// Rejects empty groups (GLPI answers them with an opaque SQL error) and
/// non-scalar condition values, which the bracket-path wire format cannot
/// carry.
pub fn validate_criteria(criteria: &[Criterion]) -> Result<(), ApiContractError> {
    for criterion in criteria {
        match criterion {
            Criterion::Group { criteria, .. } => {
                if criteria.is_empty() {
                    return Err(ApiContractError::InvalidCriteria(
                        "criteria group is empty".to_string(),
                    ));
                }
                validate_criteria(criteria)?;
            }
            Criterion::Condition { value, .. } => {
                if value.is_null() {
                    return Err(ApiContractError::InvalidCriteria(
                        "condition value is null".to_string(),
                    ));
                }
                if value.is_array() || value.is_object() {
                    return Err(ApiContractError::InvalidCriteria(
                        "condition value must be a scalar".to_string(),
                    ));
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::criteria::{Link, SearchType};
    use serde_json::json;

    #[test]
    fn upload_requires_a_file_name() {
        let upload = DocumentUpload::new(Some("report"), "");
        assert!(validate_document_upload(&upload).is_err());

        let upload = DocumentUpload::new(None, "report.pdf");
        assert!(validate_document_upload(&upload).is_ok());
    }

    #[test]
    fn nested_empty_group_is_rejected() {
        let criteria = vec![Criterion::group(
            Some(Link::And),
            vec![Criterion::group(None, Vec::new())],
        )];
        assert!(validate_criteria(&criteria).is_err());
    }

    #[test]
    fn non_scalar_condition_values_are_rejected() {
        let criteria = vec![Criterion::condition(1, SearchType::Equals, json!([1, 2]))];
        assert!(validate_criteria(&criteria).is_err());

        let criteria = vec![Criterion::condition(1, SearchType::Equals, json!(null))];
        assert!(validate_criteria(&criteria).is_err());

        let criteria = vec![Criterion::condition(1, SearchType::Equals, "ok")];
        assert!(validate_criteria(&criteria).is_ok());
    }
}
