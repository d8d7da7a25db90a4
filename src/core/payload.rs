//! Sentinel-delimited payloads.
//!
//! The transform adapter wraps its JSON result in two literal markers. The
//! host pipeline then wraps the adapter output in module boilerplate, so the
//! payload is recovered by taking exactly the text between the markers.

/// Opening marker written by the transform adapter
pub const PAYLOAD_START: &str = "// LOADER START //";

/// Closing marker written by the transform adapter
pub const PAYLOAD_END: &str = "// LOADER END //";

/// Wrap a payload in the sentinel markers
pub fn wrap_payload(payload: &str) -> String {
    format!("{}{}{}", PAYLOAD_START, payload, PAYLOAD_END)
}

/// Return the text strictly between the first start marker and the next end
/// marker, or `None` if either marker is missing.
pub fn extract_payload(text: &str) -> Option<&str> {
    let start = text.find(PAYLOAD_START)? + PAYLOAD_START.len();
    let len = text[start..].find(PAYLOAD_END)?;
    Some(&text[start..start + len])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_discards_boilerplate() {
        let module = format!(
            "/******/ (function(modules) {{\n/***/ (function(module) {{\n{}\n/***/ }})\n/******/ }});",
            wrap_payload(r#"{"files":["a.png"]}"#)
        );

        assert_eq!(extract_payload(&module), Some(r#"{"files":["a.png"]}"#));
    }

    #[test]
    fn test_extract_missing_markers() {
        assert_eq!(extract_payload("no markers here"), None);
        assert_eq!(extract_payload(&format!("{}{{}}", PAYLOAD_START)), None);
        assert_eq!(extract_payload(&format!("{{}}{}", PAYLOAD_END)), None);
    }

    #[test]
    fn test_extract_end_before_start_is_missing() {
        let text = format!("{}{{}}{}", PAYLOAD_END, PAYLOAD_START);
        assert_eq!(extract_payload(&text), None);
    }

    #[test]
    fn test_extract_empty_payload() {
        assert_eq!(extract_payload(&wrap_payload("")), Some(""));
    }
}
