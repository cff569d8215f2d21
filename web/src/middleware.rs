//! Request correlation.
//!
//! Every request gets an id: the inbound `X-Correlation-ID` when it is a
//! short header-safe token (so a proxy's request id carries through), a
//! fresh UUID otherwise. The request runs inside an `http_request` span
//! tagged with that id and the response echoes it back, which ties a
//! visitor's "my booking failed" report to one log trail.
//!
//! ```ignore
//! Router::new()
//!     .route("/api/window", get(window))
//!     .layer(correlation_id_layer())
//!     .layer(TraceLayer::new_for_http());
//! ```

use axum::{
    async_trait,
    extract::{FromRequestParts, Request},
    http::{HeaderValue, request::Parts},
    response::Response,
};
use std::convert::Infallible;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tower::{Layer, Service};
use tracing::Instrument;
use uuid::Uuid;

/// Header carrying the id in both directions.
pub const CORRELATION_ID_HEADER: &str = "X-Correlation-ID";

const MAX_INBOUND_LEN: usize = 128;

/// A request's correlation id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// A fresh random id.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Accept an inbound id if it is short and header-safe.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let safe = |c: char| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':');
        (!raw.is_empty() && raw.len() <= MAX_INBOUND_LEN && raw.chars().all(safe)).then(|| Self(raw.to_string()))
    }

    fn from_headers(request: &Request) -> Self {
        request
            .headers()
            .get(CORRELATION_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(Self::parse)
            .unwrap_or_else(Self::generate)
    }

    /// The id as text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reads the id the layer stored. Without the layer every extraction
/// yields a new id.
#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for CorrelationId {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<Self>().cloned().unwrap_or_else(Self::generate))
    }
}

/// The correlation layer.
#[must_use]
pub const fn correlation_id_layer() -> CorrelateLayer {
    CorrelateLayer
}

/// Wraps a service in [`Correlate`].
#[derive(Clone, Copy, Debug, Default)]
pub struct CorrelateLayer;

impl<S> Layer<S> for CorrelateLayer {
    type Service = Correlate<S>;

    fn layer(&self, inner: S) -> Correlate<S> {
        Correlate { inner }
    }
}

/// Assigns, records and echoes the correlation id around `inner`.
#[derive(Clone, Debug)]
pub struct Correlate<S> {
    inner: S,
}

type ResponseFuture<E> = Pin<Box<dyn Future<Output = Result<Response, E>> + Send>>;

impl<S> Service<Request> for Correlate<S>
where
    S: Service<Request, Response = Response> + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = ResponseFuture<S::Error>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), S::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request) -> Self::Future {
        let id = CorrelationId::from_headers(&request);
        let echoed = HeaderValue::from_str(id.as_str()).ok();
        let span = tracing::info_span!(
            "http_request",
            correlation_id = %id,
            method = %request.method(),
            path = %request.uri().path(),
        );
        request.extensions_mut().insert(id);

        let response = self.inner.call(request).instrument(span);
        Box::pin(async move {
            let mut response = response.await?;
            if let Some(value) = echoed {
                response.headers_mut().insert(CORRELATION_ID_HEADER, value);
            }
            Ok(response)
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::{Router, body::Body, routing::get};
    use tower::ServiceExt;

    async fn echo(inbound: Option<&str>) -> (String, String) {
        let app = Router::new()
            .route("/echo", get(|id: CorrelationId| async move { id.to_string() }))
            .layer(correlation_id_layer());

        let mut request = axum::http::Request::builder().uri("/echo");
        if let Some(inbound) = inbound {
            request = request.header(CORRELATION_ID_HEADER, inbound);
        }
        let response = app.oneshot(request.body(Body::empty()).unwrap()).await.unwrap();

        let header = response.headers()[CORRELATION_ID_HEADER].to_str().unwrap().to_string();
        let body = axum::body::to_bytes(response.into_body(), 256).await.unwrap();
        (header, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn missing_id_is_generated() {
        let (header, seen_by_handler) = echo(None).await;
        assert!(Uuid::parse_str(&header).is_ok());
        assert_eq!(header, seen_by_handler);
    }

    #[tokio::test]
    async fn inbound_id_reaches_handler_and_response() {
        assert_eq!(
            echo(Some("edge-7f3a.42")).await,
            ("edge-7f3a.42".to_string(), "edge-7f3a.42".to_string())
        );
    }

    #[tokio::test]
    async fn unsafe_inbound_id_is_replaced() {
        let (header, _) = echo(Some("has spaces; and <tags>")).await;
        assert!(Uuid::parse_str(&header).is_ok());
    }

    #[test]
    fn parse_trims_and_bounds_length() {
        assert!(CorrelationId::parse(&"a".repeat(MAX_INBOUND_LEN + 1)).is_none());
        assert!(CorrelationId::parse("  ").is_none());
        assert_eq!(CorrelationId::parse(" abc ").unwrap().as_str(), "abc");
    }
}
