//! HTTP-level tests for the reqwest transport.

use mockito::{Matcher, Server};
use rstest::rstest;
use serde_json::json;

use super::*;

#[rstest]
#[case("get", HttpMethod::Get)]
#[case("POST", HttpMethod::Post)]
#[case("Delete", HttpMethod::Delete)]
fn methods_parse_case_insensitively(#[case] raw: &str, #[case] expected: HttpMethod) {
    assert_eq!(raw.parse::<HttpMethod>().expect("method"), expected);
}

#[test]
fn methods_display_uppercase() {
    assert_eq!(HttpMethod::Patch.to_string(), "PATCH");
}

#[test]
fn bearer_replaces_existing_authorization() {
    let request = HttpRequest::get("https://api.example.com/me")
        .with_header("authorization", "Basic abc")
        .bearer("first")
        .bearer("second");

    assert_eq!(request.headers().len(), 1);
    assert_eq!(request.header("Authorization"), Some("Bearer second"));
}

#[test]
fn form_values_are_looked_up_by_name() {
    let request = HttpRequest::post("https://accounts.example.com/api/token")
        .with_form([("grant_type", "refresh_token"), ("refresh_token", "r1")]);
    assert_eq!(request.form_value("refresh_token"), Some("r1"));
    assert_eq!(request.form_value("code"), None);
}

#[rstest]
#[case(200, true, false)]
#[case(204, true, false)]
#[case(401, false, true)]
#[case(500, false, false)]
fn statuses_classify(#[case] status: u16, #[case] success: bool, #[case] unauthorized: bool) {
    let response = HttpResponse::new(status, "");
    assert_eq!(response.is_success(), success);
    assert_eq!(response.is_unauthorized(), unauthorized);
}

#[test]
fn sends_headers_and_json_bodies() {
    let mut server = Server::new();
    let mock = server
        .mock("PUT", "/v1/me/player/volume")
        .match_header("authorization", "Bearer token-1")
        .match_body(Matcher::Json(json!({"volume_percent": 40})))
        .with_status(202)
        .with_body("accepted")
        .create();

    let transport = ReqwestTransport::new().expect("client");
    let response = transport
        .send(
            &HttpRequest::new(HttpMethod::Put, format!("{}/v1/me/player/volume", server.url()))
                .bearer("token-1")
                .with_json(json!({"volume_percent": 40})),
        )
        .expect("response");

    mock.assert();
    assert_eq!(response, HttpResponse::new(202, "accepted"));
}

#[test]
fn sends_form_bodies() {
    let mut server = Server::new();
    let mock = server
        .mock("POST", "/api/token")
        .match_header("content-type", "application/x-www-form-urlencoded")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()),
            Matcher::UrlEncoded("refresh_token".into(), "r 1".into()),
        ]))
        .with_status(200)
        .with_body(r#"{"access_token":"a2"}"#)
        .create();

    let transport = ReqwestTransport::new().expect("client");
    let response = transport
        .send(
            &HttpRequest::post(format!("{}/api/token", server.url()))
                .with_form([("grant_type", "refresh_token"), ("refresh_token", "r 1")]),
        )
        .expect("response");

    mock.assert();
    let body: serde_json::Value = response.json().expect("json body");
    assert_eq!(body["access_token"], "a2");
}

#[test]
fn error_statuses_are_responses() {
    let mut server = Server::new();
    server
        .mock("GET", "/v1/me")
        .with_status(401)
        .with_body("expired")
        .create();

    let transport = ReqwestTransport::new().expect("client");
    let response = transport
        .send(&HttpRequest::get(format!("{}/v1/me", server.url())))
        .expect("response");
    assert!(response.is_unauthorized());
    assert_eq!(response.body, "expired");
}

#[test]
fn unreachable_hosts_are_transport_errors() {
    let transport =
        ReqwestTransport::with_timeout(Duration::from_secs(2)).expect("client");
    let error = transport
        .send(&HttpRequest::get("http://127.0.0.1:9/unreachable"))
        .expect_err("nothing listens on the discard port");
    assert!(matches!(error, CredentialError::Transport { .. }));
}
