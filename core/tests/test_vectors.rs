//! Verify response classification and inline framing against the JSON test
//! vectors stored in `test-vectors/`.
//!
//! Classification cases compare the outcome kind plus the fields that kind
//! carries; framing cases compare request bodies byte for byte.

use ipfs_api_core::multipart::{content_type, inline_body, BOUNDARY};
use ipfs_api_core::{Error, HttpResponse};

fn response(case: &serde_json::Value) -> HttpResponse {
    let sim = &case["response"];
    HttpResponse {
        status: sim["status"].as_u64().unwrap() as u16,
        body: sim["body"].as_str().unwrap().as_bytes().to_vec(),
    }
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

#[test]
fn classify_test_vectors() {
    let raw = include_str!("../../test-vectors/classify.json");
    let vectors: serde_json::Value = serde_json::from_str(raw).unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let expected = &case["expected"];
        let response = response(case);
        let original_body = response.body.clone();

        let result = response.classify();
        match expected["outcome"].as_str().unwrap() {
            "ok" => {
                let body = result.unwrap_or_else(|e| panic!("{name}: expected ok, got {e:?}"));
                assert_eq!(body, original_body, "{name}: body must be unmodified");
            }
            "http" => match result {
                Err(Error::Http { status, snippet }) => {
                    assert_eq!(u64::from(status), expected["status"].as_u64().unwrap(), "{name}: status");
                    assert_eq!(snippet, expected["snippet"].as_str().unwrap(), "{name}: snippet");
                }
                other => panic!("{name}: expected Http, got {other:?}"),
            },
            "remote" => match result {
                Err(Error::Remote { code, message }) => {
                    assert_eq!(code, expected["code"].as_i64().unwrap(), "{name}: code");
                    assert_eq!(message, expected["message"].as_str().unwrap(), "{name}: message");
                }
                other => panic!("{name}: expected Remote, got {other:?}"),
            },
            other => panic!("{name}: unknown outcome: {other}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Inline framing
// ---------------------------------------------------------------------------

#[test]
fn multipart_test_vectors() {
    let raw = include_str!("../../test-vectors/multipart.json");
    let vectors: serde_json::Value = serde_json::from_str(raw).unwrap();

    assert!(vectors["description"].as_str().unwrap().contains(BOUNDARY));
    assert!(content_type().ends_with(BOUNDARY));

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let content = case["content"].as_str().unwrap();
        let expected = case["expected_body"].as_str().unwrap();

        let body = inline_body(content.as_bytes());
        assert_eq!(
            String::from_utf8(body).unwrap(),
            expected,
            "{name}: framed body"
        );
    }
}
