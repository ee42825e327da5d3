//! Pairing payload parsing.
//!
//! A host advertises itself as `"<base-url>?token=<token>[&...]"`, usually
//! rendered as a QR code. Manual pairing supplies the two halves directly.

use crate::error::{ClientError, ClientResult};
use crate::types::Credential;

/// Parses a scanned pairing payload into a [`Credential`].
///
/// Splits on the first `?` and reads `token` from the remainder as
/// form-urlencoded query parameters. Other parameters are ignored.
pub fn parse_scan_payload(payload: &str) -> ClientResult<Credential> {
    let payload = payload.trim();
    if payload.is_empty() {
        return Err(ClientError::MalformedPayload("empty payload".to_string()));
    }

    let Some((url, query)) = payload.split_once('?') else {
        return Err(ClientError::MissingToken);
    };
    if url.is_empty() {
        return Err(ClientError::MalformedPayload("payload has no url before '?'".to_string()));
    }

    let token = url::form_urlencoded::parse(query.as_bytes())
        .find(|(k, _)| k == "token")
        .map(|(_, v)| v.into_owned())
        .filter(|t| !t.is_empty())
        .ok_or(ClientError::MissingToken)?;

    Ok(Credential::new(url, token))
}

/// Builds a credential from the manual pairing form.
///
/// Returns `None` when either field is blank: submitting an incomplete form
/// does nothing.
pub fn from_form(url: &str, token: &str) -> Option<Credential> {
    let (url, token) = (url.trim(), token.trim());
    if url.is_empty() || token.is_empty() {
        return None;
    }
    Some(Credential::new(url, token))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_payload_with_token() {
        let c = parse_scan_payload("https://h.example?token=abc123").unwrap();
        assert_eq!(c, Credential::new("https://h.example", "abc123"));
    }

    #[test]
    fn test_parse_payload_ignores_other_params() {
        let c = parse_scan_payload("http://10.0.0.5:3000?v=2&token=t%2Bk&name=desk").unwrap();
        assert_eq!(c.url, "http://10.0.0.5:3000");
        assert_eq!(c.token, "t+k");
    }

    #[test]
    fn test_parse_payload_splits_on_first_question_mark() {
        let c = parse_scan_payload("https://h.example?token=a?b").unwrap();
        assert_eq!(c.url, "https://h.example");
        assert_eq!(c.token, "a?b");
    }

    #[test]
    fn test_parse_payload_without_query_is_missing_token() {
        let err = parse_scan_payload("https://h.example").unwrap_err();
        assert!(matches!(err, ClientError::MissingToken));
    }

    #[test]
    fn test_parse_payload_with_empty_token() {
        assert!(matches!(parse_scan_payload("https://h.example?token="), Err(ClientError::MissingToken)));
        assert!(matches!(parse_scan_payload("https://h.example?other=1"), Err(ClientError::MissingToken)));
    }

    #[test]
    fn test_parse_payload_malformed() {
        assert!(matches!(parse_scan_payload(""), Err(ClientError::MalformedPayload(_))));
        assert!(matches!(parse_scan_payload("   "), Err(ClientError::MalformedPayload(_))));
        assert!(matches!(parse_scan_payload("?token=abc"), Err(ClientError::MalformedPayload(_))));
    }

    #[test]
    fn test_from_form() {
        assert_eq!(
            from_form("https://h.example", "tok"),
            Some(Credential::new("https://h.example", "tok"))
        );
        assert_eq!(from_form("https://h.example", ""), None);
        assert_eq!(from_form("", "tok"), None);
        assert_eq!(from_form("  ", "tok"), None);
    }
}
