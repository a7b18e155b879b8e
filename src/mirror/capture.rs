//! Request and response snapshots.
//!
//! # Responsibilities
//! - Timestamp the request on receipt and the response once its head exists
//! - Copy heads into owned snapshots for the mirror path
//! - Tee bodies so the mirror copy fills while the original streams on
//!
//! # Design Decisions
//! - Capture never awaits a body. Each frame reaches the consumer as soon as
//!   it is polled, and the copy keeps a reference to its bytes
//! - A copy settles when the original ends. If the consumer drops the body
//!   early, the unread remainder moves to the mirror side and is read there
//! - Bodies whose declared length already exceeds the mirror limit are not
//!   teed, the size gate would drop them anyway
//! - A copy that outgrows the capture ceiling is dropped; the exchange is
//!   still mirrored, without that body
//! - A read error fails the copy, and the consumer sees the error unchanged

use std::pin::Pin;
use std::task::{ready, Context, Poll};

use axum::body::{Body, Bytes, HttpBody};
use axum::http::{HeaderMap, Method, Request, Response, StatusCode};
use chrono::Utc;
use futures_util::StreamExt;
use hyper::body::{Frame, SizeHint};
use thiserror::Error;
use tokio::sync::oneshot;

use crate::mirror::envelope::{absolute_url, ConnectionMetadata};
use crate::mirror::size_gate::declared_length;

/// Why a snapshot could not be taken.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    #[error("failed to read body: {0}")]
    Read(String),

    #[error("body copy was lost before it completed")]
    Lost,
}

/// Limits applied while copying a body.
#[derive(Debug, Clone, Copy)]
pub struct CaptureLimits {
    /// Declared lengths above this are not copied.
    pub max_body_size_bytes: u64,
    /// Hard cap on bytes kept for one body.
    pub ceiling: usize,
}

/// The mirror path's copy of a body.
#[derive(Debug, Clone, PartialEq)]
pub enum CapturedBody {
    /// The message had no body.
    Absent,
    /// A body exists but its declared length exceeded the mirror limit.
    Withheld,
    /// A body exists but it outgrew the capture ceiling.
    Dropped,
    /// A full copy of the body.
    Buffered(Bytes),
}

impl CapturedBody {
    /// `Some` when the message carried a body, copied or not.
    pub fn presence(&self) -> Option<&Self> {
        match self {
            CapturedBody::Absent => None,
            _ => Some(self),
        }
    }

    /// Copied bytes, if any.
    pub fn bytes(&self) -> Option<Bytes> {
        match self {
            CapturedBody::Buffered(bytes) => Some(bytes.clone()),
            _ => None,
        }
    }
}

/// Owned copy of a request taken on receipt.
#[derive(Debug, Clone)]
pub struct RequestSnapshot {
    pub timestamp: u64,
    pub connection: ConnectionMetadata,
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: CapturedBody,
}

/// Owned copy of a response taken once the primary handler returned.
#[derive(Debug, Clone)]
pub struct ResponseSnapshot {
    pub timestamp: u64,
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: CapturedBody,
}

/// Request head copied on receipt, body copy still filling.
pub struct RequestCapture {
    pub timestamp: u64,
    pub connection: ConnectionMetadata,
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    body: PendingBody,
}

impl RequestCapture {
    /// Wait for the body copy to settle.
    pub async fn settle(self) -> Result<RequestSnapshot, CaptureError> {
        let body = self.body.settle().await?;
        Ok(RequestSnapshot {
            timestamp: self.timestamp,
            connection: self.connection,
            method: self.method,
            url: self.url,
            headers: self.headers,
            body,
        })
    }
}

/// Response head copied when the handler returned, body copy still filling.
pub struct ResponseCapture {
    pub timestamp: u64,
    pub status: StatusCode,
    pub headers: HeaderMap,
    body: PendingBody,
}

impl ResponseCapture {
    /// Wait for the body copy to settle.
    pub async fn settle(self) -> Result<ResponseSnapshot, CaptureError> {
        let body = self.body.settle().await?;
        Ok(ResponseSnapshot {
            timestamp: self.timestamp,
            status: self.status,
            headers: self.headers,
            body,
        })
    }
}

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default()
}

/// Copy a request, returning the original with a teed body.
pub fn capture_request(request: Request<Body>, limits: CaptureLimits) -> (Request<Body>, RequestCapture) {
    let timestamp = now_millis();
    let connection = ConnectionMetadata::from_request(&request);
    let url = absolute_url(&request);

    let (parts, body) = request.into_parts();
    let (body, pending) = tee_body(body, &parts.headers, limits);
    let capture = RequestCapture {
        timestamp,
        connection,
        method: parts.method.clone(),
        url,
        headers: parts.headers.clone(),
        body: pending,
    };

    (Request::from_parts(parts, body), capture)
}

/// Copy a response, returning the original with a teed body.
pub fn capture_response(response: Response<Body>, limits: CaptureLimits) -> (Response<Body>, ResponseCapture) {
    let timestamp = now_millis();

    let (parts, body) = response.into_parts();
    let (body, pending) = tee_body(body, &parts.headers, limits);
    let capture = ResponseCapture {
        timestamp,
        status: parts.status,
        headers: parts.headers.clone(),
        body: pending,
    };

    (Response::from_parts(parts, body), capture)
}

fn tee_body(body: Body, headers: &HeaderMap, limits: CaptureLimits) -> (Body, PendingBody) {
    if body.is_end_stream() {
        return (body, PendingBody::Ready(CapturedBody::Absent));
    }

    if matches!(declared_length(headers), Some(n) if n > limits.max_body_size_bytes as f64) {
        return (body, PendingBody::Ready(CapturedBody::Withheld));
    }

    let (done, settled) = oneshot::channel();
    let tee = Tee {
        inner: Some(body),
        copy: Some(BodyCopy::new(limits.ceiling)),
        done: Some(done),
    };
    (Body::new(tee), PendingBody::Teed(settled))
}

/// A body copy that settles once the original has been consumed or dropped.
enum PendingBody {
    Ready(CapturedBody),
    Teed(oneshot::Receiver<TeeEnd>),
}

impl PendingBody {
    async fn settle(self) -> Result<CapturedBody, CaptureError> {
        match self {
            PendingBody::Ready(body) => Ok(body),
            PendingBody::Teed(settled) => match settled.await {
                Ok(TeeEnd::Complete(result)) => result,
                Ok(TeeEnd::Abandoned { copy, rest }) => copy.read_rest(rest).await,
                Err(_) => Err(CaptureError::Lost),
            },
        }
    }
}

enum TeeEnd {
    Complete(Result<CapturedBody, CaptureError>),
    /// The consumer dropped the body before its end.
    Abandoned { copy: BodyCopy, rest: Body },
}

/// Bytes seen so far, up to the ceiling.
struct BodyCopy {
    chunks: Vec<Bytes>,
    len: usize,
    ceiling: usize,
    overflowed: bool,
}

impl BodyCopy {
    fn new(ceiling: usize) -> Self {
        Self {
            chunks: Vec::new(),
            len: 0,
            ceiling,
            overflowed: false,
        }
    }

    fn push(&mut self, data: &Bytes) {
        if self.overflowed {
            return;
        }
        self.len += data.len();
        if self.len > self.ceiling {
            self.overflowed = true;
            self.chunks = Vec::new();
        } else if !data.is_empty() {
            self.chunks.push(data.clone());
        }
    }

    fn finish(mut self) -> CapturedBody {
        if self.overflowed {
            return CapturedBody::Dropped;
        }
        match self.chunks.len() {
            1 => CapturedBody::Buffered(self.chunks.remove(0)),
            _ => CapturedBody::Buffered(self.chunks.concat().into()),
        }
    }

    async fn read_rest(mut self, rest: Body) -> Result<CapturedBody, CaptureError> {
        let mut rest = rest.into_data_stream();
        while !self.overflowed {
            match rest.next().await {
                Some(Ok(chunk)) => self.push(&chunk),
                Some(Err(e)) => return Err(CaptureError::Read(e.to_string())),
                None => break,
            }
        }
        Ok(self.finish())
    }
}

/// Forwards every frame of `inner` and keeps a copy of its data.
struct Tee {
    inner: Option<Body>,
    copy: Option<BodyCopy>,
    done: Option<oneshot::Sender<TeeEnd>>,
}

impl Tee {
    fn complete(&mut self, result: Result<CapturedBody, CaptureError>) {
        self.inner = None;
        if let Some(done) = self.done.take() {
            let _ = done.send(TeeEnd::Complete(result));
        }
    }
}

impl HttpBody for Tee {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Frame<Bytes>, axum::Error>>> {
        let this = &mut *self;
        let Some(inner) = this.inner.as_mut() else {
            return Poll::Ready(None);
        };

        match ready!(Pin::new(inner).poll_frame(cx)) {
            Some(Ok(frame)) => {
                if let (Some(data), Some(copy)) = (frame.data_ref(), this.copy.as_mut()) {
                    copy.push(data);
                }
                Poll::Ready(Some(Ok(frame)))
            }
            Some(Err(e)) => {
                this.complete(Err(CaptureError::Read(e.to_string())));
                Poll::Ready(Some(Err(e)))
            }
            None => {
                let captured = this.copy.take().map(BodyCopy::finish).ok_or(CaptureError::Lost);
                this.complete(captured);
                Poll::Ready(None)
            }
        }
    }

    fn is_end_stream(&self) -> bool {
        self.inner.as_ref().map_or(true, |inner| inner.is_end_stream())
    }

    fn size_hint(&self) -> SizeHint {
        self.inner
            .as_ref()
            .map_or_else(|| SizeHint::with_exact(0), |inner| inner.size_hint())
    }
}

impl Drop for Tee {
    fn drop(&mut self) {
        if let (Some(done), Some(rest), Some(copy)) = (self.done.take(), self.inner.take(), self.copy.take()) {
            let _ = done.send(TeeEnd::Abandoned { copy, rest });
        }
    }
}
