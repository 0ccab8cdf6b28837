//! Verify `classify` against JSON test vectors stored in `test-vectors/`.
//!
//! Each case describes a decoding plan, a simulated transport outcome, the
//! status the action hook must see, and the expected classified result.
//! Decoded values are compared as parsed JSON so field order does not matter.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use wirecall_core::{
    classify, ExpectedShape, Expectation, HttpResponse, JsonCodec, NoContent, Outcome, RequestError,
    TransportError, TransportOutcome,
};

#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
struct TestResponse {
    int_value: i64,
    nested: Nested,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct Nested {
    hi: String,
    hello: i64,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct ApiFault {
    code: String,
    message: String,
}

fn parse_expectation(case: &Value) -> Expectation {
    let shape = match case["shape"].as_str().unwrap() {
        "typed" => ExpectedShape::Typed,
        "no_content" => ExpectedShape::NoContent,
        other => panic!("unknown shape: {other}"),
    };
    Expectation {
        shape,
        api_error: case["api_error"].as_bool().unwrap(),
    }
}

fn parse_transport(case: &Value) -> TransportOutcome {
    if let Some(error) = case.get("error") {
        return TransportOutcome::Failed(TransportError::other(error.as_str().unwrap().to_string()));
    }
    TransportOutcome::Completed(HttpResponse {
        status: case["status"].as_u64().map(|status| status as u16),
        body: case["body"]
            .as_str()
            .map(|body| Bytes::copy_from_slice(body.as_bytes())),
    })
}

fn run<T: serde::de::DeserializeOwned>(
    case: &Value,
) -> (Outcome<T, ApiFault>, Option<u16>) {
    let mut seen = None;
    let outcome = classify(
        parse_transport(&case["transport"]),
        parse_expectation(&case["expectation"]),
        &JsonCodec,
        |status| seen = Some(status),
    );
    (outcome, seen)
}

fn check_failure(name: &str, expected: &Value, error: RequestError) {
    match (expected["kind"].as_str().unwrap(), error) {
        ("service", RequestError::Service(_)) => {}
        ("empty_data", RequestError::EmptyData) => {}
        ("http", RequestError::Http(status)) => {
            assert_eq!(Some(u64::from(status)), expected["status"].as_u64(), "{name}: status");
        }
        ("decoding", RequestError::Decoding { .. }) => {}
        (kind, error) => panic!("{name}: expected {kind}, got {error:?}"),
    }
}

fn check<T: Serialize + std::fmt::Debug>(name: &str, expected: &Value, outcome: Outcome<T, ApiFault>) {
    match outcome {
        Outcome::Ok(value) => {
            assert_eq!(expected["kind"], "ok", "{name}: got ok({value:?})");
            if let Some(expected_value) = expected.get("value") {
                assert_eq!(&serde_json::to_value(&value).unwrap(), expected_value, "{name}: value");
            }
        }
        Outcome::ApiError(fault) => {
            assert_eq!(expected["kind"], "api_error", "{name}: got api_error({fault:?})");
            let expected_fault: ApiFault = serde_json::from_value(expected["value"].clone()).unwrap();
            assert_eq!(fault, expected_fault, "{name}: api error");
        }
        Outcome::Failure(error) => check_failure(name, expected, error),
    }
}

#[test]
fn classification_vectors() {
    let raw = include_str!("../../test-vectors/classification.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let expected = &case["expected"];
        let expected_status = case["expected_hook_status"].as_u64().map(|status| status as u16);

        match case["expectation"]["shape"].as_str().unwrap() {
            "no_content" => {
                let (outcome, seen) = run::<NoContent>(case);
                assert_eq!(seen, expected_status, "{name}: hook status");
                match outcome {
                    Outcome::Ok(NoContent) => assert_eq!(expected["kind"], "ok", "{name}: got ok"),
                    Outcome::ApiError(fault) => panic!("{name}: unexpected api error {fault:?}"),
                    Outcome::Failure(error) => check_failure(name, expected, error),
                }
            }
            _ => {
                let (outcome, seen) = run::<TestResponse>(case);
                assert_eq!(seen, expected_status, "{name}: hook status");
                check(name, expected, outcome);
            }
        }
    }
}

#[test]
fn decoding_failure_carries_raw_payload() {
    let raw = include_str!("../../test-vectors/classification.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();

    let decoding_cases = vectors["cases"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|case| case["expected"]["kind"] == "decoding" && case["expectation"]["shape"] == "typed");

    for case in decoding_cases {
        let name = case["name"].as_str().unwrap();
        let (outcome, _) = run::<TestResponse>(case);
        match outcome {
            Outcome::Failure(RequestError::Decoding { data, .. }) => {
                let body = case["transport"]["body"].as_str().unwrap();
                assert_eq!(&data[..], body.as_bytes(), "{name}: raw payload");
            }
            other => panic!("{name}: expected decoding failure, got {other:?}"),
        }
    }
}
