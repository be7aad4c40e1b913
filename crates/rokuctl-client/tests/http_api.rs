//! End-to-end tests for the HTTP control surface against a canned local
//! server: command ordering over the wire, query parsing, launch
//! resolution, and the sideload credential handshake.

mod common;

use common::{CannedResponse, TestHttpServer};

use rokuctl_client::RokuClient;
use rokuctl_core::{Error, Key};

const APPS_XML: &str = concat!(
    r#"<apps>"#,
    r#"<app id="12" version="4.1.218">Netflix</app>"#,
    r#"<app id="13842" version="1.0.14">VUDU</app>"#,
    r#"</apps>"#
);

fn client_for(server: &TestHttpServer) -> RokuClient {
    RokuClient::builder("127.0.0.1")
        .ecp_port(server.port())
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_commands_hit_the_wire_in_submission_order() {
    let server = TestHttpServer::start(|_| CannedResponse::ok("")).await;
    let client = client_for(&server);

    let first = client.press(Key::Home);
    let second = client.press(Key::Select);
    let typed = client.type_text("AB");

    first.await.unwrap();
    second.await.unwrap();
    for handle in typed {
        handle.await.unwrap();
    }

    assert_eq!(
        server.request_lines(),
        vec![
            "POST /keypress/Home",
            "POST /keypress/Select",
            "POST /keypress/Lit_A",
            "POST /keypress/Lit_B",
        ]
    );
}

#[tokio::test]
async fn test_failed_press_does_not_stall_later_commands() {
    let server = TestHttpServer::start(|request| {
        if request.target.ends_with("/Home") {
            CannedResponse::status(503)
        } else {
            CannedResponse::ok("")
        }
    })
    .await;
    let client = client_for(&server);

    let failing = client.press(Key::Home);
    let next = client.press(Key::Select);

    assert!(matches!(
        failing.await.unwrap_err(),
        Error::Status { code: 503, .. }
    ));
    next.await.unwrap();
}

#[tokio::test]
async fn test_apps_query_parses_records() {
    let server = TestHttpServer::start(|_| CannedResponse::ok(APPS_XML)).await;
    let client = client_for(&server);

    let apps = client.apps().await.unwrap();
    assert_eq!(apps.len(), 2);
    assert_eq!(apps[0].id, 12);
    assert_eq!(apps[0].version, "4.1.218");
    assert_eq!(apps[0].name, "Netflix");
    assert_eq!(server.request_lines(), vec!["GET /query/apps"]);
}

#[tokio::test]
async fn test_device_info_builds_flat_map() {
    let xml = concat!(
        "<device-info>",
        "<model-name>Roku 3</model-name>",
        "<serial-number>1GU48T017973</serial-number>",
        "</device-info>"
    );
    let server = TestHttpServer::start(move |_| CannedResponse::ok(xml)).await;
    let client = client_for(&server);

    let info = client.device_info().await.unwrap();
    assert_eq!(info["model-name"], "Roku 3");
    assert_eq!(info["serial-number"], "1GU48T017973");
    assert_eq!(server.request_lines(), vec!["GET /"]);
}

#[tokio::test]
async fn test_launch_by_name_resolves_app_id() {
    let server = TestHttpServer::start(|request| {
        if request.target.starts_with("/query/apps") {
            CannedResponse::ok(APPS_XML)
        } else {
            CannedResponse::ok("")
        }
    })
    .await;
    let client = client_for(&server);

    client.launch("netflix").await.unwrap();

    assert_eq!(
        server.request_lines(),
        vec!["GET /query/apps", "POST /launch/12"]
    );
}

#[tokio::test]
async fn test_launch_unknown_name_is_error() {
    let server = TestHttpServer::start(|_| CannedResponse::ok(APPS_XML)).await;
    let client = client_for(&server);

    let err = client.launch("No Such Channel").await.unwrap_err();
    assert!(matches!(err, Error::AppNotFound { .. }));

    // Only the lookup hit the wire; no launch was attempted.
    assert_eq!(server.request_lines(), vec!["GET /query/apps"]);
}

#[tokio::test]
async fn test_launch_by_url_probes_stream_format() {
    let server = TestHttpServer::start(|request| {
        if request.target.ends_with(".mp4") {
            CannedResponse::ok("").content_type("video/mp4")
        } else {
            CannedResponse::ok("")
        }
    })
    .await;
    let client = client_for(&server);

    let media_url = format!("http://127.0.0.1:{}/clip.mp4", server.port());
    client.launch(media_url.as_str()).await.unwrap();

    let lines = server.request_lines();
    assert_eq!(lines[0], "HEAD /clip.mp4");
    assert!(lines[1].starts_with("POST /launch/dev?"));
    assert!(lines[1].contains("streamformat=mp4"));
}

#[tokio::test]
async fn test_launch_with_args_appends_query() {
    let server = TestHttpServer::start(|_| CannedResponse::ok("")).await;
    let client = client_for(&server);

    client
        .launch_with_args("12", &[("contentId", "abc"), ("mediaType", "movie")])
        .await
        .unwrap();

    let lines = server.request_lines();
    assert!(lines[0].starts_with("POST /launch/12?"));
    assert!(lines[0].contains("contentId=abc"));
    assert!(lines[0].contains("mediaType=movie"));
}

#[tokio::test]
async fn test_input_bypasses_queue_and_carries_query() {
    let server = TestHttpServer::start(|_| CannedResponse::ok("")).await;
    let client = client_for(&server);

    client.input([("type", "text"), ("text", "hi")]).await.unwrap();

    let lines = server.request_lines();
    assert!(lines[0].starts_with("POST /input?"));
    assert!(lines[0].contains("type=text"));
    assert!(lines[0].contains("text=hi"));
}

#[tokio::test]
async fn test_icon_streams_binary_body() {
    let server = TestHttpServer::start(|_| {
        CannedResponse::ok("not-really-a-png").content_type("image/png")
    })
    .await;
    let client = client_for(&server);

    let response = client.icon(12).await.unwrap();
    let bytes = response.bytes().await.unwrap();
    assert_eq!(&bytes[..], b"not-really-a-png");
    assert_eq!(server.request_lines(), vec!["GET /query/icon/12"]);
}

#[tokio::test]
async fn test_install_sends_credentials_only_after_challenge() {
    let server = TestHttpServer::start(|request| {
        if request.header("authorization").is_some() {
            CannedResponse::ok("")
        } else {
            CannedResponse::status(401)
        }
    })
    .await;

    let client = RokuClient::builder("127.0.0.1")
        .ecp_port(server.port())
        .installer_port(server.port())
        .dev_password("hunter2")
        .build()
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let archive = dir.path().join("channel.zip");
    std::fs::write(&archive, b"PK\x03\x04fake").unwrap();

    client.install(&archive).await.unwrap();

    let requests = server.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].line(), "POST /plugin_install");
    assert!(requests[0].header("authorization").is_none());
    assert!(requests[1]
        .header("authorization")
        .unwrap()
        .starts_with("Basic "));
}
