//! Integration tests for the request executor against a mock gateway.

#[path = "common/test_constants.rs"]
mod test_constants;

use std::time::Duration;

use rstest::{fixture, rstest};
use serde::Serialize;
use serde_json::{Value, json};
use siteops::api::{Method, RequestSpec};
use siteops::{ApiClient, Backend, ResponseOutcome, ServiceAccount};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use test_constants::{BASIC_AUTH_HEADER, SERVICE_PASSWORD, SERVICE_USER};

#[fixture]
async fn server() -> MockServer {
    MockServer::start().await
}

fn client_for(base_url: &str) -> ApiClient {
    ApiClient::new(
        base_url,
        ServiceAccount::new(SERVICE_USER, SERVICE_PASSWORD),
        Duration::from_secs(5),
    )
    .unwrap_or_else(|err| panic!("client: {err}"))
}

#[rstest]
#[tokio::test]
async fn requests_carry_basic_auth_and_json_negotiation(#[future(awt)] server: MockServer) {
    Mock::given(method("GET"))
        .and(path("/hosting/v1/sites/7"))
        .and(header("authorization", BASIC_AUTH_HEADER))
        .and(header("accept", "application/json"))
        .and(header("content-type", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "state": "active" })))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = client_for(&server.uri())
        .get(Backend::Hosting, "sites/7")
        .await;

    assert_eq!(outcome, ResponseOutcome::Success(json!({ "state": "active" })));
}

#[rstest]
#[case(201)]
#[case(202)]
#[case(204)]
#[tokio::test]
async fn empty_success_statuses(#[future(awt)] server: MockServer, #[case] status: u16) {
    Mock::given(method("DELETE"))
        .and(path("/modules/v1/modules/3"))
        .respond_with(ResponseTemplate::new(status))
        .mount(&server)
        .await;

    let outcome = client_for(&server.uri())
        .delete(Backend::Modules, "modules/3")
        .await;

    assert_eq!(outcome, ResponseOutcome::EmptySuccess);
}

#[rstest]
#[case(400)]
#[case(404)]
#[case(500)]
#[tokio::test]
async fn non_success_statuses_become_http_errors(
    #[future(awt)] server: MockServer,
    #[case] status: u16,
) {
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(status).set_body_json(json!({ "error_code": "ignored" })),
        )
        .mount(&server)
        .await;

    let outcome = client_for(&server.uri())
        .get(Backend::Deploy, "projects/1/runs/2")
        .await;

    assert_eq!(outcome, ResponseOutcome::HttpError(status));
}

#[rstest]
#[case(Method::Get, 302)]
#[case(Method::Post, 303)]
#[case(Method::Get, 307)]
#[tokio::test]
async fn redirects_are_reported_not_followed(
    #[future(awt)] server: MockServer,
    #[case] verb: Method,
    #[case] status: u16,
) {
    Mock::given(method(verb.to_string()))
        .and(path("/hosting/v1/sites/1"))
        .respond_with(
            ResponseTemplate::new(status).insert_header("location", "/hosting/v1/elsewhere"),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/hosting/v1/elsewhere"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "state": "moved" })))
        .expect(0)
        .mount(&server)
        .await;

    let request = RequestSpec::new(Backend::Hosting, verb, "sites/1");
    let outcome = client_for(&server.uri()).execute(&request).await;

    assert_eq!(outcome, ResponseOutcome::HttpError(status));
}

#[rstest]
#[tokio::test]
async fn error_code_in_success_body_becomes_api_error(#[future(awt)] server: MockServer) {
    Mock::given(method("POST"))
        .and(path("/code/v1/projects"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error_code": "name_taken",
            "error_message": "a project with this name exists",
        })))
        .mount(&server)
        .await;

    let outcome = client_for(&server.uri())
        .post(Backend::CodeHost, "projects", json!({ "name": "blog" }))
        .await;

    assert_eq!(
        outcome,
        ResponseOutcome::ApiError {
            code: String::from("name_taken"),
            message: String::from("a project with this name exists"),
        }
    );
}

#[rstest]
#[tokio::test]
async fn non_json_body_is_passed_through_as_text(#[future(awt)] server: MockServer) {
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("pong"))
        .mount(&server)
        .await;

    let outcome = client_for(&server.uri())
        .get(Backend::Hosting, "ping")
        .await;

    assert_eq!(outcome, ResponseOutcome::Success(Value::from("pong")));
}

#[derive(Serialize)]
struct Rename<'a> {
    name: &'a str,
}

#[rstest]
#[tokio::test]
async fn typed_bodies_and_extra_headers_are_sent(#[future(awt)] server: MockServer) {
    Mock::given(method("PUT"))
        .and(path("/site-manager/v1/sites/9"))
        .and(header("x-request-source", "tests"))
        .and(body_json(json!({ "name": "renamed" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 9 })))
        .expect(1)
        .mount(&server)
        .await;

    let request = RequestSpec::new(Backend::SiteManager, Method::Put, "/sites/9")
        .with_json(&Rename { name: "renamed" })
        .unwrap_or_else(|err| panic!("encode body: {err}"))
        .with_header("x-request-source", "tests");
    let outcome = client_for(&server.uri()).execute(&request).await;

    assert_eq!(outcome.payload(), Some(&json!({ "id": 9 })));
}

#[rstest]
#[tokio::test]
async fn trailing_slash_in_base_url_is_ignored(#[future(awt)] server: MockServer) {
    Mock::given(method("GET"))
        .and(path("/hosting/v1/sites/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "state": "active" })))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = client_for(&format!("{}/", server.uri()))
        .get(Backend::Hosting, "sites/1")
        .await;

    assert!(outcome.is_success());
}

#[tokio::test]
async fn unreachable_gateway_is_a_transport_failure() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap_or_else(|err| panic!("bind probe port: {err}"));
    let address = listener
        .local_addr()
        .unwrap_or_else(|err| panic!("probe address: {err}"));
    drop(listener);

    let outcome = client_for(&format!("http://{address}"))
        .get(Backend::Hosting, "sites/1")
        .await;

    assert!(
        matches!(outcome, ResponseOutcome::TransportFailure { .. }),
        "unexpected outcome: {outcome:?}"
    );
}
