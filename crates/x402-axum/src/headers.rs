//! The wire codec boundary (spec §6 "Wire: Payment headers").
//!
//! Alias matching is case-insensitive and accepts either of two header
//! names per direction, matching both the snake/kebab `PAYMENT-*` names and
//! the legacy `X-Payment*` names in use across x402 SDKs.

use base64::Engine;
use http::HeaderMap;
use serde::Serialize;
use serde::de::DeserializeOwned;
use x402_types::PaymentPayload;

pub const PAYMENT_REQUIRED_HEADERS: [&str; 2] = ["payment-required", "x-payment-required"];
pub const PAYMENT_SIGNATURE_HEADERS: [&str; 2] = ["payment-signature", "x-payment"];

fn find_header<'a>(headers: &'a HeaderMap, names: &[&str]) -> Option<&'a http::HeaderValue> {
    names.iter().find_map(|name| headers.get(*name))
}

/// Looks up the client's signed payment payload from the request headers,
/// trying both recognized aliases.
pub fn extract_payment_payload(headers: &HeaderMap) -> Option<PaymentPayload> {
    let header = find_header(headers, &PAYMENT_SIGNATURE_HEADERS)?;
    decode_base64_json(header.to_str().ok()?)
}

/// Encodes a value as base64-encoded JSON suitable for a payment header.
pub fn encode_base64_json<T: Serialize>(value: &T) -> Option<String> {
    let json = serde_json::to_vec(value).ok()?;
    Some(base64::engine::general_purpose::STANDARD.encode(json))
}

/// Decodes a base64-encoded JSON payment header value.
pub fn decode_base64_json<T: DeserializeOwned>(raw: &str) -> Option<T> {
    let bytes = base64::engine::general_purpose::STANDARD.decode(raw.trim()).ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// Which header name a `PaymentRequired` advertisement was found under /
/// should be written under, preferring the canonical `PAYMENT-*` form.
pub fn payment_required_header_name() -> &'static str {
    PAYMENT_REQUIRED_HEADERS[0]
}

/// Which header name a signed payload should be written under, preferring
/// the canonical `PAYMENT-SIGNATURE` form.
pub fn payment_signature_header_name() -> &'static str {
    PAYMENT_SIGNATURE_HEADERS[0]
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    #[test]
    fn finds_either_alias_case_insensitively() {
        let mut headers = HeaderMap::new();
        headers.insert("X-Payment", HeaderValue::from_static("eyJhIjoxfQ=="));
        assert!(find_header(&headers, &PAYMENT_SIGNATURE_HEADERS).is_some());
    }

    #[test]
    fn roundtrips_base64_json() {
        let value = serde_json::json!({"a": 1});
        let encoded = encode_base64_json(&value).unwrap();
        let decoded: serde_json::Value = decode_base64_json(&encoded).unwrap();
        assert_eq!(decoded, value);
    }
}
