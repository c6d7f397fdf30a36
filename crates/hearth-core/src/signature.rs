//! Telephony webhook request signatures
//!
//! The SMS provider signs each webhook POST with
//! base64(HMAC-SHA1(auth token, url ++ sorted form parameters)) in the
//! `X-Twilio-Signature` header. Upstream proxies can rewrite the URL the
//! handler sees, so validation walks an ordered list of candidate URLs and
//! passes on the first match.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use std::collections::BTreeMap;

type HmacSha1 = Hmac<Sha1>;

pub const SIGNATURE_HEADER: &str = "x-twilio-signature";

fn signed_mac(auth_token: &str, url: &str, params: &BTreeMap<String, String>) -> HmacSha1 {
    let mut data = String::from(url);
    for (key, value) in params {
        data.push_str(key);
        data.push_str(value);
    }
    let mut mac =
        HmacSha1::new_from_slice(auth_token.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(data.as_bytes());
    mac
}

/// Expected signature for one candidate URL and parameter map
pub fn compute_signature(auth_token: &str, url: &str, params: &BTreeMap<String, String>) -> String {
    BASE64.encode(signed_mac(auth_token, url, params).finalize().into_bytes())
}

/// Constant-time check of a provided signature against one candidate URL
pub fn verify_signature(
    auth_token: &str,
    url: &str,
    params: &BTreeMap<String, String>,
    provided: &str,
) -> bool {
    let provided = match BASE64.decode(provided) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };
    signed_mac(auth_token, url, params)
        .verify_slice(&provided)
        .is_ok()
}

/// Ordered candidate URLs for validation: the request URL as the handler saw
/// it, the same with the query string stripped, every configured canonical
/// URL, and an http-scheme variant for proxies that terminate TLS.
pub fn candidate_urls(seen_url: Option<&str>, configured: &[String]) -> Vec<String> {
    let mut candidates = Vec::new();
    if let Some(seen) = seen_url {
        candidates.push(seen.to_string());
        if let Some((base, _query)) = seen.split_once('?') {
            candidates.push(base.to_string());
        }
    }
    for url in configured {
        candidates.push(url.clone());
    }
    if let Some(seen) = seen_url {
        if let Some(rest) = seen.strip_prefix("https://") {
            candidates.push(format!("http://{}", rest));
        }
    }
    candidates
}

/// Validate a signed request against every candidate URL. Succeeds if any
/// candidate matches.
pub fn validate_request(
    auth_token: &str,
    seen_url: Option<&str>,
    configured: &[String],
    params: &BTreeMap<String, String>,
    provided: &str,
) -> bool {
    candidate_urls(seen_url, configured)
        .iter()
        .any(|url| verify_signature(auth_token, url, params, provided))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        map.insert("Body".to_string(), "Hi".to_string());
        map.insert("From".to_string(), "+15551234567".to_string());
        map.insert("To".to_string(), "+15559999999".to_string());
        map
    }

    #[test]
    fn test_round_trip() {
        let url = "https://relay.example/webhook";
        let sig = compute_signature("token", url, &params());
        assert!(verify_signature("token", url, &params(), &sig));
    }

    #[test]
    fn test_rejects_tampered_params() {
        let url = "https://relay.example/webhook";
        let sig = compute_signature("token", url, &params());

        let mut tampered = params();
        tampered.insert("Body".to_string(), "Hi there".to_string());
        assert!(!verify_signature("token", url, &tampered, &sig));
    }

    #[test]
    fn test_rejects_wrong_token_and_garbage() {
        let url = "https://relay.example/webhook";
        let sig = compute_signature("token", url, &params());
        assert!(!verify_signature("other", url, &params(), &sig));
        assert!(!verify_signature("token", url, &params(), "not base64 !!!"));
    }

    #[test]
    fn test_candidate_order() {
        let configured = vec!["https://public.example/webhook".to_string()];
        let candidates = candidate_urls(
            Some("https://internal.example/webhook?x=1"),
            &configured,
        );
        assert_eq!(
            candidates,
            vec![
                "https://internal.example/webhook?x=1",
                "https://internal.example/webhook",
                "https://public.example/webhook",
                "http://internal.example/webhook?x=1",
            ]
        );
    }

    #[test]
    fn test_validates_against_rewritten_url() {
        // Proxy rewrote the host; only the configured canonical URL matches.
        let configured = vec!["https://public.example/webhook".to_string()];
        let sig = compute_signature("token", "https://public.example/webhook", &params());
        assert!(validate_request(
            "token",
            Some("https://10.0.0.5/webhook"),
            &configured,
            &params(),
            &sig
        ));
        assert!(!validate_request(
            "token",
            Some("https://10.0.0.5/webhook"),
            &[],
            &params(),
            &sig
        ));
    }
}
