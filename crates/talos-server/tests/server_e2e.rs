//! End-to-end tests over a real listener: lifecycle signals, install
//! ordering, wire-level responses and client-error reporting.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use talos_core::{HttpError, Request, Value};
use talos_pipeline::prelude::*;
use talos_pipeline::router::Controller;
use talos_server::{serve, MapRouter, ServerOptions};

async fn bound_listener() -> (TcpListener, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, addr)
}

async fn http_get(addr: SocketAddr, path: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!("GET {path} HTTP/1.1\r\nhost: test\r\nconnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut response = Vec::new();
    stream.read_to_end(&mut response).await.unwrap();
    String::from_utf8_lossy(&response).into_owned()
}

fn demo_router() -> Arc<MapRouter> {
    let controller = Arc::new(
        Controller::new()
            .handle("greeting", |_req, _route| async { Ok("hi there!".into()) })
            .handle("empty", |_req, _route| async { Ok(String::new().into()) })
            .handle("fails", |_req: Request, _route: RouteMatch| async {
                Err::<Value, _>(Failure::from(HttpError::new("It fails!")))
            }),
    );
    Arc::new(
        MapRouter::new(controller)
            .route("GET", "/", "greeting")
            .route("GET", "/empty", "empty")
            .route("GET", "/fails", "fails")
            .route("GET", "/unwritten", "unwritten"),
    )
}

#[tokio::test]
async fn serves_text_responses_over_the_wire() {
    let (listener, addr) = bound_listener().await;
    let handle = serve(
        "e2e",
        listener,
        demo_router(),
        Vec::new(),
        ServerOptions::new(),
    );
    handle.listening().await.unwrap();

    let response = http_get(addr, "/").await;

    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(response.contains("content-type: text/plain; charset=utf-8"));
    assert!(response.ends_with("hi there!"));

    handle.uninstall().await;
}

#[tokio::test]
async fn empty_string_handler_is_204_without_content_type() {
    let (listener, addr) = bound_listener().await;
    let handle = serve(
        "e2e",
        listener,
        demo_router(),
        Vec::new(),
        ServerOptions::new(),
    );
    handle.listening().await.unwrap();

    let response = http_get(addr, "/empty").await;

    assert!(response.starts_with("HTTP/1.1 204 No Content\r\n"));
    assert!(!response.to_ascii_lowercase().contains("content-type"));

    handle.uninstall().await;
}

#[tokio::test]
async fn handler_error_is_a_json_500_without_stack() {
    let (listener, addr) = bound_listener().await;
    let handle = serve(
        "e2e",
        listener,
        demo_router(),
        Vec::new(),
        ServerOptions::new(),
    );
    handle.listening().await.unwrap();

    let response = http_get(addr, "/fails").await;

    assert!(response.starts_with("HTTP/1.1 500 Internal Server Error\r\n"));
    let body = response.split("\r\n\r\n").nth(1).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(body).unwrap();
    assert_eq!(parsed["message"], "It fails!");
    assert!(parsed.get("stack").is_none());

    handle.uninstall().await;
}

#[tokio::test]
async fn missing_handler_is_501_with_literal_message() {
    let (listener, addr) = bound_listener().await;
    let handle = serve(
        "e2e",
        listener,
        demo_router(),
        Vec::new(),
        ServerOptions::new(),
    );
    handle.listening().await.unwrap();

    let response = http_get(addr, "/unwritten").await;

    assert!(response.starts_with("HTTP/1.1 501 Not Implemented\r\n"));
    assert!(response.contains(r#""\"GET /unwritten\" is not implemented.""#));

    handle.uninstall().await;
}

struct InstallProbe {
    id: u32,
    log: Arc<Mutex<Vec<u32>>>,
}

impl Middleware for InstallProbe {
    fn name(&self) -> &'static str {
        "install-probe"
    }

    fn process_server<'a>(
        &'a self,
        server: Server,
        next: InstallNext<'a>,
    ) -> BoxFuture<'a, Result<Server, HttpError>> {
        Box::pin(async move {
            self.log.lock().unwrap().push(self.id);
            let server = next.run(server).await?;
            self.log.lock().unwrap().push(self.id);
            Ok(server)
        })
    }
}

#[tokio::test]
async fn install_runs_in_order_and_unwinds_in_reverse() {
    let log: Arc<Mutex<Vec<u32>>> = Arc::new(Mutex::new(Vec::new()));
    let middleware: Vec<Arc<dyn Middleware>> = (1..=3)
        .map(|id| {
            Arc::new(InstallProbe {
                id,
                log: Arc::clone(&log),
            }) as Arc<dyn Middleware>
        })
        .collect();

    let (listener, _addr) = bound_listener().await;
    let handle = serve(
        "ordered",
        listener,
        demo_router(),
        middleware,
        ServerOptions::new(),
    );

    handle.listening().await.unwrap();
    assert_eq!(*log.lock().unwrap(), vec![1, 2, 3]);

    handle.uninstall().await;
    assert_eq!(*log.lock().unwrap(), vec![1, 2, 3, 3, 2, 1]);
}

#[tokio::test]
async fn uninstall_is_idempotent() {
    let (listener, addr) = bound_listener().await;
    let handle = serve(
        "idempotent",
        listener,
        demo_router(),
        Vec::new(),
        ServerOptions::new(),
    );
    handle.listening().await.unwrap();

    handle.uninstall().await;
    handle.uninstall().await;
    handle.closed().await;

    // The port is released once teardown completes.
    let err = tokio::time::timeout(Duration::from_secs(1), async {
        loop {
            match TcpStream::connect(addr).await {
                Ok(_) => tokio::time::sleep(Duration::from_millis(10)).await,
                Err(e) => break e,
            }
        }
    })
    .await;
    assert!(err.is_ok(), "listener should stop accepting after close");
}

#[tokio::test]
async fn malformed_requests_are_reported_out_of_band() {
    let reported: Arc<Mutex<Vec<SocketAddr>>> = Arc::new(Mutex::new(Vec::new()));
    let reported_clone = Arc::clone(&reported);

    let (listener, addr) = bound_listener().await;
    let handle = serve(
        "client-errors",
        listener,
        demo_router(),
        Vec::new(),
        ServerOptions::new().on_client_error(move |_error, peer| {
            reported_clone.lock().unwrap().push(peer);
        }),
    );
    handle.listening().await.unwrap();

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(b"THIS IS NOT HTTP\r\n\r\n").await.unwrap();
    let mut sink = Vec::new();
    let _ = stream.read_to_end(&mut sink).await;

    // Give the connection task a moment to run the hook.
    tokio::time::timeout(Duration::from_secs(1), async {
        while reported.lock().unwrap().is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("client error should be reported");

    handle.uninstall().await;
}

#[tokio::test]
async fn ndjson_stream_is_framed_on_the_wire() {
    let controller = Arc::new(Controller::new().handle("events", |_req, _route| async {
        let items = futures_util::stream::iter(vec![
            serde_json::json!({"n": 1}),
            serde_json::json!({"n": 2}),
        ]);
        Ok(Value::Response(talos_core::Response::object_stream(items)))
    }));
    let router = Arc::new(MapRouter::new(controller).route("GET", "/events", "events"));

    let (listener, addr) = bound_listener().await;
    let handle = serve("ndjson", listener, router, Vec::new(), ServerOptions::new());
    handle.listening().await.unwrap();

    let response = http_get(addr, "/events").await;

    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(response.contains("content-type: application/x-ndjson; charset=utf-8"));
    assert!(response.contains("{\"n\":1}\n"));
    assert!(response.contains("{\"n\":2}\n"));

    handle.uninstall().await;
}
