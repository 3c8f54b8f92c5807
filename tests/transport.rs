use async_trait::async_trait;
use futures::future::join_all;
use http::{HeaderMap, HeaderValue, StatusCode};
use httpmitm::matchers::{
    any, body_partial_json, body_string, exact_url, header, path_regex, query_param,
    BodyExactMatcher, MatchExt,
};
use httpmitm::{
    Body, Error, MitmTransport, NotFoundResponder, Request, Response, ResponseTemplate,
    RoundTrip, TimeoutResponder, Times, UNLIMITED_TIMES,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::{Arc, Mutex};

/// Stands in for the network: answers 502 and remembers what it was sent.
#[derive(Clone, Default)]
struct Upstream {
    seen: Arc<Mutex<Vec<Request>>>,
}

impl Upstream {
    fn urls(&self) -> Vec<String> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .map(|request| request.url.to_string())
            .collect()
    }
}

#[async_trait]
impl RoundTrip for Upstream {
    async fn round_trip(&self, request: Request) -> Result<Response, Error> {
        self.seen.lock().unwrap().push(request);
        Ok(Response::new(
            StatusCode::BAD_GATEWAY,
            HeaderMap::new(),
            "upstream",
        ))
    }
}

fn transport() -> (MitmTransport, Upstream) {
    let upstream = Upstream::default();
    let transport = MitmTransport::builder()
        .passthrough(upstream.clone())
        .build();
    (transport, upstream)
}

fn get(url: &str) -> Request {
    Request::get(url).unwrap()
}

#[async_std::test]
async fn a_registered_request_is_answered_from_the_mock() {
    // Arrange
    let (transport, upstream) = transport();
    let mut headers = HeaderMap::new();
    headers.insert("x-request-id", HeaderValue::from_static("42"));
    transport
        .mock_request("GET", "https://example.com/users")
        .with_response(200, Some(headers), "[]");

    // Act
    let response = transport
        .round_trip(get("mitm://example.com/users"))
        .await
        .unwrap();

    // Assert
    assert_eq!(response.status, 200);
    assert_eq!(response.text(), "[]");
    assert_eq!(response.header("x-request-id"), Some("42"));
    assert!(upstream.urls().is_empty());
}

#[async_std::test]
async fn method_and_host_are_compared_case_insensitively() {
    // Arrange
    let (transport, _) = transport();
    transport
        .mock_request("post", "HTTPS://Example.COM/Users")
        .with_response(201, None, ());

    // Act
    let request = Request::new("POST", "mitm://example.com/Users").unwrap();
    let response = transport.round_trip(request).await.unwrap();

    // Assert
    assert_eq!(response.status, 201);
}

#[async_std::test]
async fn unknown_origins_are_refused() {
    // Arrange
    let (transport, _) = transport();
    transport
        .mock_request("GET", "https://example.com/")
        .with_response(200, None, ());

    // Act
    let other_host = transport.round_trip(get("mitm://example.org/")).await;
    let other_method = transport
        .round_trip(Request::new("DELETE", "mitm://example.com/").unwrap())
        .await;

    // Assert
    assert!(matches!(other_host, Err(Error::Refused)));
    assert!(matches!(other_method, Err(Error::Refused)));
}

#[async_std::test]
async fn unknown_paths_are_not_found() {
    // Arrange
    let (transport, _) = transport();
    transport
        .mock_request("GET", "https://example.com/users")
        .with_response(200, None, ());

    // Act
    let result = transport.round_trip(get("mitm://example.com/groups")).await;

    // Assert
    assert!(matches!(result, Err(Error::NotFound)));
}

#[async_std::test]
async fn exact_paths_take_precedence_over_root_and_wildcard() {
    // Arrange
    let (transport, _) = transport();
    transport
        .mock_request("GET", "https://example.com/users")
        .with_response(200, None, "users")
        .mock_request("GET", "https://example.com/")
        .by_matcher(any())
        .any_times()
        .with_response(200, None, "root")
        .mock_request("GET", "https://example.com/*")
        .any_times()
        .with_response(200, None, "wildcard");

    // Act
    let exact = transport
        .round_trip(get("mitm://example.com/users"))
        .await
        .unwrap();
    let fallback = transport
        .round_trip(get("mitm://example.com/groups"))
        .await
        .unwrap();

    // Assert
    assert_eq!(exact.text(), "users");
    assert_eq!(fallback.text(), "root");
}

#[async_std::test]
async fn the_wildcard_answers_every_path_of_its_origin() {
    // Arrange
    let (transport, _) = transport();
    transport
        .mock_request("GET", "https://example.com/*")
        .any_times()
        .with_response(200, None, "wildcard");

    // Act
    let responses = join_all(
        ["mitm://example.com/a", "mitm://example.com/a/b", "mitm://example.com"]
            .iter()
            .map(|url| transport.round_trip(get(url))),
    )
    .await;

    // Assert
    for response in responses {
        assert_eq!(response.unwrap().text(), "wildcard");
    }
}

#[async_std::test]
async fn the_root_mock_passes_other_paths_through_with_the_default_matcher() {
    // Arrange
    let (transport, upstream) = transport();
    transport
        .mock_request("GET", "https://example.com/")
        .any_times()
        .with_response(200, None, "root");

    // Act
    let response = transport
        .round_trip(get("mitm://example.com/other"))
        .await
        .unwrap();

    // Assert
    assert_eq!(response.status, StatusCode::BAD_GATEWAY);
    assert_eq!(upstream.urls(), vec!["https://example.com/other".to_owned()]);
}

#[async_std::test]
async fn an_exhausted_mock_passes_the_request_through_on_its_original_scheme() {
    // Arrange
    let (transport, upstream) = transport();
    transport
        .mock_request("GET", "https://example.com/")
        .times(1)
        .with_response(101, None, "OK");

    // Act
    let first = transport
        .round_trip(get("mitm://example.com/"))
        .await
        .unwrap();
    let second = transport
        .round_trip(get("mitm://example.com/"))
        .await
        .unwrap();

    // Assert
    assert_eq!(first.status, 101);
    assert_eq!(first.text(), "OK");
    assert_eq!(second.status, StatusCode::BAD_GATEWAY);
    assert_eq!(upstream.urls(), vec!["https://example.com/".to_owned()]);

    let report = &transport.reports()[0];
    assert_eq!(report.key, "GET https://example.com/");
    assert_eq!(report.invoked, 1);
    assert_eq!(report.exceeded, 1);
    assert!(!report.is_satisfied());
}

#[async_std::test]
async fn zero_times_never_answers() {
    // Arrange
    let (transport, upstream) = transport();
    transport
        .mock_request("GET", "https://example.com/")
        .times(0)
        .with_response(200, None, ());

    // Act
    let response = transport
        .round_trip(get("mitm://example.com/"))
        .await
        .unwrap();

    // Assert
    assert_eq!(response.status, StatusCode::BAD_GATEWAY);
    assert_eq!(upstream.urls().len(), 1);
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct User {
    id: u64,
    name: String,
}

#[async_std::test]
async fn any_times_answers_json_every_time() {
    // Arrange
    let (transport, _) = transport();
    transport
        .mock_request("GET", "https://example.com/users/1")
        .any_times()
        .with_json_response(200, None, json!({"id": 1, "name": "mitm"}));

    for _ in 0..10 {
        // Act
        let response = transport
            .round_trip(get("mitm://example.com/users/1"))
            .await
            .unwrap();

        // Assert
        assert_eq!(response.header("content-type"), Some("application/json"));
        let user: User = response.body_json().unwrap();
        assert_eq!(
            user,
            User {
                id: 1,
                name: "mitm".into()
            }
        );
    }

    let report = &transport.reports()[0];
    assert_eq!(report.expected, Times::Unlimited);
    assert_eq!(report.invoked, 10);
    assert!(report.is_satisfied());
}

#[async_std::test]
async fn xml_responses_use_the_single_key_as_root() {
    // Arrange
    let (transport, _) = transport();
    transport
        .mock_request("GET", "https://example.com/feed")
        .with_xml_response(200, None, json!({"user": {"name": "mitm"}}));

    // Act
    let response = transport
        .round_trip(get("mitm://example.com/feed"))
        .await
        .unwrap();

    // Assert
    assert_eq!(response.header("content-type"), Some("text/xml"));
    assert!(response.text().contains("<user><name>mitm</name></user>"));
}

#[async_std::test]
async fn structured_bodies_need_an_encoding() {
    // Arrange
    let (transport, _) = transport();
    transport
        .mock_request("GET", "https://example.com/")
        .with_response(200, None, json!({"id": 1}));

    // Act
    let result = transport.round_trip(get("mitm://example.com/")).await;

    // Assert
    assert!(matches!(result, Err(Error::Unsupported(_))));
}

#[async_std::test]
async fn content_length_is_derived_from_the_body_unless_provided() {
    // Arrange
    let (transport, _) = transport();
    let mut headers = HeaderMap::new();
    headers.insert("content-length", HeaderValue::from_static("100"));
    transport
        .mock_request("GET", "https://example.com/derived")
        .with_response(200, None, "12345")
        .mock_request("GET", "https://example.com/provided")
        .with_response(200, Some(headers), "12345");

    // Act
    let derived = transport
        .round_trip(get("mitm://example.com/derived"))
        .await
        .unwrap();
    let provided = transport
        .round_trip(get("mitm://example.com/provided"))
        .await
        .unwrap();

    // Assert
    assert_eq!(derived.content_length, Some(5));
    assert_eq!(provided.content_length, Some(100));
    assert_eq!(provided.body.len(), 5);
}

#[async_std::test]
async fn form_bodies_are_encoded_sorted_by_key() {
    // Arrange
    let (transport, _) = transport();
    transport
        .mock_request("GET", "https://example.com/form")
        .with_response(
            200,
            None,
            httpmitm::Body::form(vec![("b", "2"), ("a", "1 1")]),
        );

    // Act
    let response = transport
        .round_trip(get("mitm://example.com/form"))
        .await
        .unwrap();

    // Assert
    assert_eq!(response.text(), "a=1+1&b=2");
}

#[async_std::test]
async fn callee_responses_see_the_request() {
    // Arrange
    let (transport, _) = transport();
    transport
        .mock_request("POST", "https://example.com/echo")
        .any_times()
        .with_callee_response(|request: &Request| {
            Ok(ResponseTemplate::new(200).set_body_bytes(request.body.clone()))
        });

    // Act
    let request = Request::new("POST", "mitm://example.com/echo")
        .unwrap()
        .set_body("ping");
    let response = transport.round_trip(request).await.unwrap();

    // Assert
    assert_eq!(response.text(), "ping");
}

#[async_std::test]
async fn callee_errors_are_surfaced() {
    // Arrange
    let (transport, _) = transport();
    transport
        .mock_request("GET", "https://example.com/")
        .with_callee_response(|_: &Request| Err("backend exploded".into()));

    // Act
    let result = transport.round_trip(get("mitm://example.com/")).await;

    // Assert
    match result {
        Err(Error::Callee(e)) => assert_eq!(e.to_string(), "backend exploded"),
        other => panic!("expected a callee error, got {:?}", other.map(|r| r.status)),
    }
}

#[async_std::test]
async fn responders_can_fail_like_the_network() {
    // Arrange
    let (transport, _) = transport();
    transport
        .mock_request("GET", "https://example.com/slow")
        .with_responder(TimeoutResponder);

    // Act
    let result = transport.round_trip(get("mitm://example.com/slow")).await;

    // Assert
    assert!(matches!(result, Err(Error::Timeout)));
}

#[async_std::test]
async fn custom_matchers_decide_which_requests_are_answered() {
    // Arrange
    let (transport, upstream) = transport();
    transport
        .mock_request("POST", "https://example.com/users")
        .by_matcher(
            query_param("dry_run", "true")
                .and(header("x-api-key", "secret"))
                .and(body_partial_json(json!({"name": "mitm"}))),
        )
        .any_times()
        .with_response(201, None, ());

    let request = |key: &str| {
        Request::new("POST", "mitm://example.com/users?dry_run=true")
            .unwrap()
            .insert_header("x-api-key", key)
            .set_body(json!({"name": "mitm", "id": 1}).to_string())
    };

    // Act
    let matched = transport.round_trip(request("secret")).await.unwrap();
    let unmatched = transport.round_trip(request("wrong")).await.unwrap();

    // Assert
    assert_eq!(matched.status, 201);
    assert_eq!(unmatched.status, StatusCode::BAD_GATEWAY);
    assert_eq!(
        upstream.urls(),
        vec!["https://example.com/users?dry_run=true".to_owned()]
    );
}

#[async_std::test]
async fn times_and_matcher_after_the_response_reconfigure_the_mock() {
    // Arrange
    let (transport, _) = transport();
    transport
        .mock_request("GET", "https://example.com/")
        .with_response(200, None, ())
        .times(3)
        .by_matcher(|_: &Request, _: &url::Url| true);

    // Act
    for _ in 0..3 {
        let response = transport
            .round_trip(get("mitm://example.com/?page=2"))
            .await
            .unwrap();
        assert_eq!(response.status, 200);
    }

    // Assert
    let report = &transport.reports()[0];
    assert_eq!(report.expected, Times::Exact(3));
    assert!(report.is_satisfied());
}

#[async_std::test]
async fn the_last_registration_for_a_path_wins() {
    // Arrange
    let (transport, _) = transport();
    transport
        .mock_request("GET", "https://example.com/")
        .with_response(200, None, "first")
        .mock_request("GET", "https://example.com/")
        .with_response(200, None, "second");

    // Act
    let response = transport
        .round_trip(get("mitm://example.com/"))
        .await
        .unwrap();

    // Assert
    assert_eq!(response.text(), "second");
    assert_eq!(transport.reports().len(), 1);
}

#[async_std::test]
async fn an_abandoned_registration_refuses_its_origin() {
    // Arrange
    let (transport, _) = transport();
    transport
        .mock_request("GET", "https://abandoned.com/")
        .mock_request("GET", "https://example.com/")
        .with_response(200, None, ());

    // Act
    let abandoned = transport
        .round_trip(get("mitm://abandoned.com/anything"))
        .await;
    let answered = transport.round_trip(get("mitm://example.com/")).await;

    // Assert
    assert!(matches!(abandoned, Err(Error::Refused)));
    assert_eq!(answered.unwrap().status, 200);
}

#[async_std::test]
async fn a_response_replaces_the_refusing_placeholder() {
    // Arrange
    let (transport, _) = transport();
    transport
        .mock_request("GET", "https://example.com/a")
        .mock_request("GET", "https://example.org/")
        .with_response(200, None, ())
        .mock_request("GET", "https://example.com/a")
        .with_response(200, None, "a");

    // Act
    let response = transport
        .round_trip(get("mitm://example.com/a"))
        .await
        .unwrap();

    // Assert
    assert_eq!(response.text(), "a");
}

#[async_std::test]
async fn reopening_the_pending_registration_keeps_its_configuration() {
    // Arrange
    let (transport, _) = transport();
    transport
        .mock_request("GET", "https://example.com/")
        .times(2)
        .mock_request("GET", "https://example.com/")
        .with_response(200, None, ());

    // Assert
    assert_eq!(transport.reports()[0].expected, Times::Exact(2));
}

#[async_std::test]
async fn requests_on_other_schemes_go_straight_to_the_passthrough() {
    // Arrange
    let (transport, upstream) = transport();
    transport
        .mock_request("GET", "https://example.com/")
        .with_response(200, None, ());

    // Act
    let response = transport
        .round_trip(get("https://example.com/"))
        .await
        .unwrap();

    // Assert
    assert_eq!(response.status, StatusCode::BAD_GATEWAY);
    assert_eq!(upstream.urls(), vec!["https://example.com/".to_owned()]);
    assert_eq!(transport.reports()[0].invoked, 0);
}

#[async_std::test]
async fn received_requests_are_recorded_in_order() {
    // Arrange
    let (transport, _) = transport();

    // Act
    let _ = transport.round_trip(get("mitm://example.com/first")).await;
    let _ = transport.round_trip(get("mitm://example.com/second")).await;

    // Assert
    let received: Vec<String> = transport
        .received_requests()
        .unwrap()
        .iter()
        .map(|request| request.url.path().to_owned())
        .collect();
    assert_eq!(received, vec!["/first", "/second"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_never_overshoot_the_expected_times() {
    // Arrange
    let (transport, upstream) = transport();
    transport
        .mock_request("GET", "https://example.com/")
        .times(5)
        .with_response(200, None, ());

    // Act
    let handles: Vec<_> = (0..20)
        .map(|_| {
            let transport = transport.clone();
            tokio::spawn(async move { transport.round_trip(get("mitm://example.com/")).await })
        })
        .collect();
    let mut answered = 0;
    for handle in handles {
        if handle.await.unwrap().unwrap().status == 200 {
            answered += 1;
        }
    }

    // Assert
    assert_eq!(answered, 5);
    assert_eq!(upstream.urls().len(), 15);
    let report = &transport.reports()[0];
    assert_eq!(report.invoked, 5);
    assert_eq!(report.exceeded, 15);
}

#[test]
#[should_panic(expected = "not a chained invocation")]
fn a_response_without_a_registration_panics() {
    MitmTransport::new().with_response(200, None, ());
}

#[test]
#[should_panic(expected = "not a chained invocation")]
fn times_without_a_registration_panics() {
    MitmTransport::new().times(2);
}

#[test]
#[should_panic(expected = "not a chained response")]
fn a_second_response_on_the_same_registration_panics() {
    MitmTransport::new()
        .mock_request("GET", "https://example.com/")
        .with_response(200, None, ())
        .with_response(201, None, ());
}

#[test]
#[should_panic(expected = "invalid value of times (-2)")]
fn negative_times_panic() {
    MitmTransport::new()
        .mock_request("GET", "https://example.com/")
        .times(-2);
}

#[test]
fn unlimited_times_is_accepted() {
    let transport = MitmTransport::new();
    transport
        .mock_request("GET", "https://example.com/")
        .times(UNLIMITED_TIMES)
        .with_response(200, None, ());

    assert!(transport.reports()[0].expected.is_unlimited());
}

#[test]
#[should_panic(expected = "invalid url")]
fn unparsable_urls_panic() {
    MitmTransport::new().mock_request("GET", "not a url");
}

#[async_std::test]
async fn any_times_after_a_json_response_unbounds_the_mock() {
    // Arrange
    let (transport, _) = transport();
    transport
        .mock_request("GET", "mitm://example.com/x")
        .with_json_response(200, None, json!({"n": 1}))
        .any_times();

    for _ in 0..10 {
        // Act
        let response = transport
            .round_trip(get("mitm://example.com/x"))
            .await
            .unwrap();

        // Assert
        assert_eq!(response.status, 200);
        assert_eq!(response.header("content-type"), Some("application/json"));
        assert_eq!(response.text(), r#"{"n":1}"#);
    }
}

#[async_std::test]
async fn reset_drops_every_registration() {
    // Arrange
    let (transport, _) = transport();
    transport
        .mock_request("GET", "https://example.com/")
        .with_response(200, None, ());

    // Act
    transport.reset();
    let result = transport.round_trip(get("mitm://example.com/")).await;

    // Assert
    assert!(matches!(result, Err(Error::Refused)));
    assert!(transport.reports().is_empty());
}

#[async_std::test]
async fn cancelling_a_request_has_no_effect() {
    // Arrange
    let (transport, _) = transport();
    transport
        .mock_request("GET", "https://example.com/")
        .with_response(200, None, ());
    let request = get("mitm://example.com/");

    // Act
    transport.cancel_request(&request);
    let response = transport.round_trip(request).await.unwrap();

    // Assert
    assert_eq!(response.status, 200);
}

#[test]
fn the_routing_table_is_printable() {
    let (transport, _) = transport();
    transport
        .mock_request("GET", "https://example.com/users")
        .with_response(200, None, ());

    let printed = format!("{:?}", transport);

    assert!(printed.contains("GET mitm://example.com"));
    assert!(printed.contains("https://example.com/users"));
}

#[async_std::test]
async fn explicit_default_ports_are_part_of_the_origin() {
    // Arrange
    let (transport, _) = transport();
    transport
        .mock_request("GET", "https://example.com:443/a")
        .any_times()
        .with_response(200, None, "explicit");

    // Act
    let explicit = transport
        .round_trip(get("mitm://example.com:443/a"))
        .await
        .unwrap();
    let implicit = transport.round_trip(get("mitm://example.com/a")).await;

    // Assert
    assert_eq!(explicit.text(), "explicit");
    assert!(matches!(implicit, Err(Error::Refused)));
}

#[async_std::test]
async fn path_regex_narrows_a_wildcard_registration() {
    // Arrange
    let (transport, upstream) = transport();
    transport
        .mock_request("GET", "https://example.com/*")
        .by_matcher(path_regex(r"^/users/\d+$"))
        .any_times()
        .with_response(200, None, "user");

    // Act
    let matched = transport
        .round_trip(get("mitm://example.com/users/42"))
        .await
        .unwrap();
    let unmatched = transport
        .round_trip(get("mitm://example.com/users/me"))
        .await
        .unwrap();

    // Assert
    assert_eq!(matched.text(), "user");
    assert_eq!(unmatched.status, StatusCode::BAD_GATEWAY);
    assert_eq!(upstream.urls(), vec!["https://example.com/users/me".to_owned()]);
}

#[async_std::test]
async fn exact_url_rejects_a_different_query_string() {
    // Arrange
    let (transport, upstream) = transport();
    transport
        .mock_request("GET", "https://example.com/search?q=rust")
        .by_matcher(exact_url())
        .any_times()
        .with_response(200, None, "results");

    // Act
    let matched = transport
        .round_trip(get("mitm://example.com/search?q=rust"))
        .await
        .unwrap();
    let unmatched = transport
        .round_trip(get("mitm://example.com/search?q=go"))
        .await
        .unwrap();

    // Assert
    assert_eq!(matched.text(), "results");
    assert_eq!(unmatched.status, StatusCode::BAD_GATEWAY);
    assert_eq!(
        upstream.urls(),
        vec!["https://example.com/search?q=go".to_owned()]
    );
}

#[async_std::test]
async fn body_matchers_compare_the_whole_body() {
    // Arrange
    let (transport, upstream) = transport();
    let binary = vec![0u8, 159, 146, 150];
    transport
        .mock_request("POST", "https://example.com/text")
        .by_matcher(body_string("ping"))
        .with_response(200, None, "pong")
        .mock_request("POST", "https://example.com/binary")
        .by_matcher(BodyExactMatcher::bytes(binary.clone()))
        .with_response(200, None, "received");

    let post = |url: &str, body: Vec<u8>| Request::new("POST", url).unwrap().set_body(body);

    // Act
    let text = transport
        .round_trip(post("mitm://example.com/text", b"ping".to_vec()))
        .await
        .unwrap();
    let longer = transport
        .round_trip(post("mitm://example.com/text", b"ping!".to_vec()))
        .await
        .unwrap();
    let bytes = transport
        .round_trip(post("mitm://example.com/binary", binary))
        .await
        .unwrap();

    // Assert
    assert_eq!(text.text(), "pong");
    assert_eq!(longer.status, StatusCode::BAD_GATEWAY);
    assert_eq!(bytes.text(), "received");
    assert_eq!(upstream.urls(), vec!["https://example.com/text".to_owned()]);
}

#[async_std::test]
async fn the_not_found_responder_fails_like_a_missing_resource() {
    // Arrange
    let (transport, _) = transport();
    transport
        .mock_request("GET", "https://example.com/gone")
        .with_responder(NotFoundResponder);

    // Act
    let result = transport.round_trip(get("mitm://example.com/gone")).await;

    // Assert
    assert!(matches!(result, Err(Error::NotFound)));
    assert!(transport.reports()[0].is_satisfied());
}

#[async_std::test]
async fn bodies_read_from_a_reader_are_served_every_time() {
    // Arrange
    let (transport, _) = transport();
    let body = Body::from_reader(std::io::Cursor::new(b"from a file".to_vec())).unwrap();
    transport
        .mock_request("GET", "https://example.com/download")
        .times(2)
        .with_response(200, None, body);

    // Act
    let first = transport
        .round_trip(get("mitm://example.com/download"))
        .await
        .unwrap();
    let second = transport
        .round_trip(get("mitm://example.com/download"))
        .await
        .unwrap();

    // Assert
    assert_eq!(first.text(), "from a file");
    assert_eq!(second.text(), "from a file");
    assert_eq!(second.content_length, Some(11));
}

#[async_std::test]
async fn templates_can_carry_json_and_repeated_headers() {
    // Arrange
    let (transport, _) = transport();
    let user = User {
        id: 7,
        name: "mitm".into(),
    };
    transport
        .mock_request("GET", "https://example.com/users/7")
        .with_responder(
            ResponseTemplate::new(200)
                .append_header("set-cookie", "a=1")
                .append_header("set-cookie", "b=2")
                .set_body_json(&user),
        );

    // Act
    let response = transport
        .round_trip(get("mitm://example.com/users/7"))
        .await
        .unwrap();

    // Assert
    assert_eq!(response.header("content-type"), Some("application/json"));
    let cookies: Vec<_> = response.headers.get_all("set-cookie").iter().collect();
    assert_eq!(cookies, vec!["a=1", "b=2"]);
    assert_eq!(response.body_json::<User>().unwrap(), user);
}
