//! Timeout enforcement.
//!
//! # Responsibilities
//! - Bound the TLS handshake of outbound https connections on its own clock
//! - Tell the transport when a request body has been fully sent, so the
//!   response header wait starts there
//! - Cancel operations cleanly on timeout
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - Timeout errors surface as `io::ErrorKind::TimedOut` so error
//!   classification sees them like any other timeout
//! - Timed-out requests return 504 Gateway Timeout

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::uri::Scheme;
use axum::http::Uri;
use hyper::body::{Body as HttpBody, Frame, SizeHint};
use hyper_rustls::MaybeHttpsStream;
use hyper_util::rt::TokioIo;
use rustls::pki_types::ServerName;
use rustls::ClientConfig;
use tokio::sync::oneshot;
use tokio_rustls::TlsConnector;
use tower::Service;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Connector that opens the TCP connection through `inner`, then runs the
/// TLS handshake for https destinations under its own deadline.
///
/// `inner` enforces the connect timeout; the handshake clock starts once the
/// socket is up. Plain http destinations skip TLS.
#[derive(Clone)]
pub struct TimedTlsConnector<C> {
    inner: C,
    tls: TlsConnector,
    handshake_timeout: Duration,
}

impl<C> TimedTlsConnector<C> {
    pub fn new(inner: C, tls: Arc<ClientConfig>, handshake_timeout: Duration) -> Self {
        Self {
            inner,
            tls: TlsConnector::from(tls),
            handshake_timeout,
        }
    }
}

impl<C> Service<Uri> for TimedTlsConnector<C>
where
    C: Service<Uri> + 'static,
    C::Response: hyper::rt::Read + hyper::rt::Write + Unpin + Send + 'static,
    C::Future: Send + 'static,
    C::Error: Into<BoxError>,
{
    type Response = MaybeHttpsStream<C::Response>;
    type Error = BoxError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, BoxError>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(Into::into)
    }

    fn call(&mut self, dst: Uri) -> Self::Future {
        let server_name = (dst.scheme() == Some(&Scheme::HTTPS)).then(|| server_name(&dst));
        let connecting = self.inner.call(dst);
        let tls = self.tls.clone();
        let limit = self.handshake_timeout;

        Box::pin(async move {
            let server_name = match server_name {
                Some(name) => Some(name?),
                None => None,
            };

            let tcp = connecting.await.map_err(Into::into)?;
            let Some(server_name) = server_name else {
                return Ok(MaybeHttpsStream::Http(tcp));
            };

            match within(limit, tls.connect(server_name, TokioIo::new(tcp))).await {
                Some(Ok(stream)) => Ok(MaybeHttpsStream::from(stream)),
                Some(Err(e)) => Err(e.into()),
                None => Err(io::Error::new(io::ErrorKind::TimedOut, "TLS handshake timed out").into()),
            }
        })
    }
}

fn server_name(dst: &Uri) -> Result<ServerName<'static>, BoxError> {
    let host = dst
        .host()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "missing host in URI"))?;
    let host = host.trim_start_matches('[').trim_end_matches(']');
    ServerName::try_from(host.to_string())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e).into())
}

/// Wrap `body` so the returned receiver resolves once the body has been
/// fully read, has failed, or was dropped.
pub fn notify_on_end(body: Body) -> (Body, oneshot::Receiver<()>) {
    let (tx, rx) = oneshot::channel();
    let mut signal = EndSignal {
        inner: body,
        done: Some(tx),
    };
    if signal.inner.is_end_stream() {
        signal.finish();
    }
    (Body::new(signal), rx)
}

struct EndSignal {
    inner: Body,
    done: Option<oneshot::Sender<()>>,
}

impl EndSignal {
    fn finish(&mut self) {
        if let Some(tx) = self.done.take() {
            let _ = tx.send(());
        }
    }
}

impl HttpBody for EndSignal {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, axum::Error>>> {
        let frame = ready!(Pin::new(&mut self.inner).poll_frame(cx));
        // hyper stops polling once `is_end_stream` reports true.
        let finished = match &frame {
            Some(Ok(_)) => self.inner.is_end_stream(),
            None | Some(Err(_)) => true,
        };
        if finished {
            self.finish();
        }
        Poll::Ready(frame)
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl Drop for EndSignal {
    fn drop(&mut self) {
        self.finish();
    }
}

/// Await `fut`, giving up after `limit`.
///
/// Returns `None` on timeout; the future is dropped, which cancels any
/// in-flight I/O it owns.
pub async fn within<F: Future>(limit: Duration, fut: F) -> Option<F::Output> {
    tokio::time::timeout(limit, fut).await.ok()
}
