//! The server-install chain.
//!
//! At install time every middleware's `process_server` hook runs in
//! declared order. The innermost continuation announces that the server is
//! listening and then suspends on the close signal, so each hook's
//! post-`next` code runs only once the server is closing, and in reverse
//! installation order, because the resolution propagates back outward
//! through the nested awaits.
//!
//! Install order 1,2,3 therefore always tears down as 3,2,1, even when the
//! close is triggered while installation is still in flight: the close
//! signal is level-triggered, so the innermost link observes it
//! immediately after the last hook's pre-`next` code finishes.

use std::sync::Arc;
use std::sync::Mutex;

use tokio::sync::oneshot;

use talos_core::HttpError;

use crate::middleware::{BoxFuture, Middleware};
use crate::server::Server;
use crate::shutdown::CloseSignal;

/// Continuation into the remaining install chain.
///
/// Consumed by value: a `process_server` hook calls `run` exactly once and
/// awaits the result, which resolves at close time.
pub struct InstallNext<'a> {
    rest: &'a [Arc<dyn Middleware>],
    gate: &'a ListeningGate,
    close: &'a CloseSignal,
}

impl<'a> InstallNext<'a> {
    /// Installs the rest of the chain and suspends until close.
    pub fn run(self, server: Server) -> BoxFuture<'a, Result<Server, HttpError>> {
        Box::pin(async move {
            match self.rest.split_first() {
                Some((mw, rest)) => {
                    tracing::debug!(middleware = mw.name(), "installing middleware");
                    let next = InstallNext {
                        rest,
                        gate: self.gate,
                        close: self.close,
                    };
                    let server = mw.process_server(server, next).await?;
                    tracing::debug!(middleware = mw.name(), "middleware uninstalled");
                    Ok(server)
                }
                None => {
                    self.gate.open(&server);
                    self.close.recv().await;
                    Ok(server)
                }
            }
        })
    }
}

struct ListeningGate {
    tx: Mutex<Option<oneshot::Sender<Server>>>,
}

impl ListeningGate {
    fn open(&self, server: &Server) {
        if let Ok(mut guard) = self.tx.lock() {
            if let Some(tx) = guard.take() {
                let _ = tx.send(server.clone());
            }
        }
    }
}

/// Drives the full install/uninstall cycle for a middleware array.
///
/// `listening` fires with the (possibly wrapped) server value once every
/// hook's pre-`next` code has run. The returned future resolves only
/// after `close` has been triggered and every hook's post-`next` code has
/// unwound.
///
/// # Errors
///
/// Propagates the first [`HttpError`] raised by any hook; hooks outward of
/// the failure still observe it and may run their own teardown.
pub async fn drive_install(
    middleware: &[Arc<dyn Middleware>],
    server: Server,
    listening: oneshot::Sender<Server>,
    close: &CloseSignal,
) -> Result<Server, HttpError> {
    let gate = ListeningGate {
        tx: Mutex::new(Some(listening)),
    };
    InstallNext {
        rest: middleware,
        gate: &gate,
        close,
    }
    .run(server)
    .await
}
