//! Input validation utilities

use crate::error::{LibraryError, LibraryResult};

const MAX_FILE_NAME_LEN: usize = 255;

/// Normalize and validate an uploaded file name.
///
/// Browsers may submit a full client path; only the final component is kept.
pub fn validate_file_name(raw: &str) -> LibraryResult<String> {
    let name = raw
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();

    if name.is_empty() {
        return Err(LibraryError::Validation(
            "File name cannot be empty".to_string(),
        ));
    }
    if name.chars().count() > MAX_FILE_NAME_LEN {
        return Err(LibraryError::Validation(format!(
            "File name must be {} characters or less",
            MAX_FILE_NAME_LEN
        )));
    }
    if name == "." || name == ".." {
        return Err(LibraryError::Validation(format!(
            "Invalid file name: {}",
            name
        )));
    }
    if name.chars().any(|c| c.is_control()) {
        return Err(LibraryError::Validation(
            "File name contains control characters".to_string(),
        ));
    }
    Ok(name.to_string())
}

/// Validate an annotation payload: a JSON object carrying a 1-based `page`.
pub fn validate_annotation_payload(payload: &serde_json::Value) -> LibraryResult<()> {
    let map = payload.as_object().ok_or_else(|| {
        LibraryError::Validation("Annotation payload must be a JSON object".to_string())
    })?;
    match map.get("page").and_then(|p| p.as_u64()) {
        Some(page) if page >= 1 => Ok(()),
        Some(_) => Err(LibraryError::Validation(
            "Annotation page numbers start at 1".to_string(),
        )),
        None => Err(LibraryError::Validation(
            "Annotation payload requires an integer 'page'".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_validate_file_name() {
        assert_eq!(validate_file_name("report.pdf").unwrap(), "report.pdf");
        assert_eq!(validate_file_name("  spaced.pdf ").unwrap(), "spaced.pdf");
        assert_eq!(
            validate_file_name("C:\\Users\\me\\scan.pdf").unwrap(),
            "scan.pdf"
        );
        assert_eq!(validate_file_name("/tmp/a/b.pdf").unwrap(), "b.pdf");
        assert!(validate_file_name("").is_err());
        assert!(validate_file_name("   ").is_err());
        assert!(validate_file_name("dir/").is_err());
        assert!(validate_file_name("..").is_err());
        assert!(validate_file_name("bad\u{0007}.pdf").is_err());
        assert!(validate_file_name(&"a".repeat(256)).is_err());
    }

    #[test]
    fn test_validate_annotation_payload() {
        assert!(validate_annotation_payload(&json!({"page": 1, "text": "hi"})).is_ok());
        assert!(validate_annotation_payload(&json!({"page": 0})).is_err());
        assert!(validate_annotation_payload(&json!({"page": "2"})).is_err());
        assert!(validate_annotation_payload(&json!({"rects": []})).is_err());
        assert!(validate_annotation_payload(&json!(null)).is_err());
        assert!(validate_annotation_payload(&json!([1, 2])).is_err());
    }
}
