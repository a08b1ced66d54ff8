//! Server lifecycle: install, dispatch, uninstall.
//!
//! [`serve`] wires a dispatcher onto a bound TCP listener and drives the
//! server-install middleware chain around it. The returned
//! [`ServerHandle`] exposes the two lifecycle signals:
//!
//! - [`ServerHandle::listening`] resolves once the listener is accepting
//!   *and* every install hook's pre-`next` code has run;
//! - [`ServerHandle::closed`] resolves once the listener has stopped,
//!   the install chain has unwound in reverse order, and in-flight
//!   connections have drained.
//!
//! [`ServerHandle::uninstall`] triggers teardown and awaits `closed`; it
//! is idempotent, so every call observes the same completion.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{oneshot, watch};

use http_body_util::BodyExt;
use talos_core::BodyError;
use talos_pipeline::{drive_install, CloseSignal, Middleware, Router, Server};

use crate::config::{ClientErrorHook, ServerOptions};
use crate::dispatch::Dispatcher;

/// Errors surfaced by the server handle.
#[derive(Debug, Clone, Error)]
pub enum ServerError {
    /// A server-install hook failed before the server started listening.
    #[error("Server install failed: {0}")]
    Install(String),

    /// The server closed before it ever started listening.
    #[error("Server closed before listening")]
    ClosedEarly,
}

#[derive(Debug, Clone)]
enum ListenState {
    Pending,
    Up,
    Failed(String),
}

/// Handle to a running server.
#[derive(Debug, Clone)]
pub struct ServerHandle {
    server: Server,
    local_addr: Option<SocketAddr>,
    close: CloseSignal,
    listening: watch::Receiver<ListenState>,
    closed: watch::Receiver<bool>,
}

impl ServerHandle {
    /// Returns the server name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.server.name()
    }

    /// Returns `true` if the server faces external clients.
    #[must_use]
    pub fn is_external(&self) -> bool {
        self.server.is_external()
    }

    /// Returns the configured metrics sink, if any.
    #[must_use]
    pub fn metrics(&self) -> Option<&talos_telemetry::MetricsSink> {
        self.server.metrics()
    }

    /// Returns the address the listener is bound to.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Resolves once the listener is up and the install chain has run.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Install`] if an install hook failed, or
    /// [`ServerError::ClosedEarly`] if the server shut down first.
    pub async fn listening(&self) -> Result<(), ServerError> {
        let mut rx = self.listening.clone();
        let result = match rx.wait_for(|s| !matches!(s, ListenState::Pending)).await {
            Ok(state) => match &*state {
                ListenState::Up => Ok(()),
                ListenState::Failed(message) => Err(ServerError::Install(message.clone())),
                ListenState::Pending => Err(ServerError::ClosedEarly),
            },
            Err(_) => Err(ServerError::ClosedEarly),
        };
        result
    }

    /// Resolves once teardown is complete.
    pub async fn closed(&self) {
        let mut rx = self.closed.clone();
        // A dropped sender means the lifecycle task is gone, which only
        // happens after teardown.
        let _ = rx.wait_for(|closed| *closed).await;
    }

    /// Begins orderly teardown and waits for it to finish.
    ///
    /// Idempotent: repeated calls (and concurrent callers) all wait on
    /// the same completion.
    pub async fn uninstall(&self) {
        self.close.trigger();
        self.closed().await;
    }
}

/// Installs the middleware stack around `listener` and starts serving.
///
/// The listener must already be bound. Requests are dispatched through the
/// three-phase pipeline; malformed client requests are reported through
/// the `on_client_error` option and never produce responses.
#[must_use]
pub fn serve(
    name: impl Into<String>,
    listener: TcpListener,
    router: Arc<dyn Router>,
    middleware: Vec<Arc<dyn Middleware>>,
    options: ServerOptions,
) -> ServerHandle {
    let server = Server::new(name, options.external_flag(), options.resolve_metrics());
    let local_addr = listener.local_addr().ok();
    let close = CloseSignal::new();
    let (listen_tx, listen_rx) = watch::channel(ListenState::Pending);
    let (closed_tx, closed_rx) = watch::channel(false);

    let dispatcher = Dispatcher::new(server.clone(), router, middleware.clone());
    let tracker = ConnectionTracker::new();

    tokio::spawn(accept_loop(
        listener,
        dispatcher,
        close.clone(),
        tracker.clone(),
        options.client_error_hook(),
    ));

    let middleware: Arc<[Arc<dyn Middleware>]> = middleware.into();
    let install_server = server.clone();
    let install_close = close.clone();
    tokio::spawn(async move {
        let (ready_tx, ready_rx) = oneshot::channel();
        let mut install = std::pin::pin!(drive_install(
            &middleware,
            install_server,
            ready_tx,
            &install_close,
        ));

        // The innermost chain link fires `ready` before suspending on the
        // close signal, so on the happy path the ready arm wins and we
        // announce `listening` while the install chain stays parked.
        let result = tokio::select! {
            ready = ready_rx => {
                if let Ok(server) = ready {
                    tracing::info!(server = server.name(), "server listening");
                    let _ = listen_tx.send(ListenState::Up);
                }
                install.as_mut().await
            }
            result = install.as_mut() => result,
        };

        if let Err(error) = result {
            tracing::error!(error = %error, "server install chain failed");
            listen_tx.send_if_modified(|state| {
                if matches!(state, ListenState::Pending) {
                    *state = ListenState::Failed(error.to_string());
                    true
                } else {
                    false
                }
            });
            install_close.trigger();
        }

        tracker.drained().await;
        let _ = closed_tx.send(true);
        tracing::info!("server closed");
    });

    ServerHandle {
        server,
        local_addr,
        close,
        listening: listen_rx,
        closed: closed_rx,
    }
}

async fn accept_loop(
    listener: TcpListener,
    dispatcher: Dispatcher,
    close: CloseSignal,
    tracker: ConnectionTracker,
    on_client_error: Option<ClientErrorHook>,
) {
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let token = tracker.acquire();
                    tokio::spawn(handle_connection(
                        stream,
                        peer,
                        dispatcher.clone(),
                        close.clone(),
                        on_client_error.clone(),
                        token,
                    ));
                }
                Err(e) => {
                    tracing::error!(error = %e, "failed to accept connection");
                }
            },
            () = close.recv() => break,
        }
    }
    // Dropping the listener detaches the server from the port.
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    dispatcher: Dispatcher,
    close: CloseSignal,
    on_client_error: Option<ClientErrorHook>,
    token: ConnectionToken,
) {
    let io = TokioIo::new(stream);
    let service = service_fn(move |request: http::Request<Incoming>| {
        let dispatcher = dispatcher.clone();
        async move {
            let request = request.map(|body| body.map_err(|e| Box::new(e) as BodyError).boxed());
            Ok::<_, std::convert::Infallible>(dispatcher.handle(request).await)
        }
    });

    let connection = http1::Builder::new().serve_connection(io, service);

    tokio::select! {
        result = connection => {
            if let Err(error) = result {
                match &on_client_error {
                    Some(hook) => hook(&error, peer),
                    None => tracing::debug!(%peer, %error, "client connection error"),
                }
            }
        }
        () = close.recv() => {
            tracing::debug!(%peer, "connection aborted by server close");
        }
    }

    drop(token);
}

/// Counts live connections so teardown can wait for them to drain.
#[derive(Debug, Clone)]
pub(crate) struct ConnectionTracker {
    active: Arc<AtomicUsize>,
    notify: Arc<tokio::sync::Notify>,
}

impl ConnectionTracker {
    fn new() -> Self {
        Self {
            active: Arc::new(AtomicUsize::new(0)),
            notify: Arc::new(tokio::sync::Notify::new()),
        }
    }

    fn acquire(&self) -> ConnectionToken {
        self.active.fetch_add(1, Ordering::SeqCst);
        ConnectionToken {
            active: Arc::clone(&self.active),
            notify: Arc::clone(&self.notify),
        }
    }

    async fn drained(&self) {
        while self.active.load(Ordering::SeqCst) > 0 {
            self.notify.notified().await;
        }
    }
}

/// Held for the lifetime of one connection.
#[derive(Debug)]
pub(crate) struct ConnectionToken {
    active: Arc<AtomicUsize>,
    notify: Arc<tokio::sync::Notify>,
}

impl Drop for ConnectionToken {
    fn drop(&mut self) {
        if self.active.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.notify.notify_waiters();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracker_counts_tokens() {
        let tracker = ConnectionTracker::new();
        let a = tracker.acquire();
        let b = tracker.acquire();
        assert_eq!(tracker.active.load(Ordering::SeqCst), 2);
        drop(a);
        drop(b);
        assert_eq!(tracker.active.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_drained_completes_without_connections() {
        let tracker = ConnectionTracker::new();
        tokio::time::timeout(std::time::Duration::from_millis(10), tracker.drained())
            .await
            .expect("drained should complete immediately");
    }

    #[tokio::test]
    async fn test_drained_waits_for_last_token() {
        let tracker = ConnectionTracker::new();
        let token = tracker.acquire();

        let waiter = {
            let tracker = tracker.clone();
            tokio::spawn(async move { tracker.drained().await })
        };

        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            drop(token);
        });

        tokio::time::timeout(std::time::Duration::from_secs(1), waiter)
            .await
            .expect("drained should complete")
            .expect("waiter should not panic");
    }
}
