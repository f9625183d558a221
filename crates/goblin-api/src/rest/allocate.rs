use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::{Body, Bytes};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures::Stream;
use tokio_util::sync::{CancellationToken, DropGuard, WaitForCancellationFutureOwned};
use tracing::info;

use crate::AppState;

/// A response body that yields the allocated IP once, then pends until its
/// lease token is cancelled. Hyper drives this stream for the life of the
/// connection: a client disconnect drops the stream, which drops `guard`
/// and cancels the token (observed on the other end by the Lease Manager);
/// a process shutdown cancels the same token from the outside, which this
/// stream notices via `cancelled` and ends itself so the connection closes
/// and graceful shutdown can complete. Either direction is how a lease's
/// end is observed, since axum gives handlers no explicit "done" channel.
struct LeaseBody {
    line: Option<Bytes>,
    cancelled: Pin<Box<WaitForCancellationFutureOwned>>,
    _guard: DropGuard,
}

impl LeaseBody {
    fn new(line: Bytes, token: CancellationToken, guard: DropGuard) -> Self {
        LeaseBody {
            line: Some(line),
            cancelled: Box::pin(token.cancelled_owned()),
            _guard: guard,
        }
    }
}

impl Stream for LeaseBody {
    type Item = Result<Bytes, std::convert::Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if let Some(line) = self.line.take() {
            return Poll::Ready(Some(Ok(line)));
        }
        match self.cancelled.as_mut().poll(cx) {
            Poll::Ready(()) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}

pub async fn allocate(
    State(state): State<AppState>,
    Path(subdomain): Path<String>,
) -> Response {
    let token = state.shutdown.child_token();
    let guard = token.clone().drop_guard();

    match state.manager.acquire(&subdomain, token.clone()).await {
        Ok(ip) => {
            info!(%subdomain, %ip, "allocate request opened");
            let body = LeaseBody::new(Bytes::from(format!("{ip}\n")), token, guard);
            (StatusCode::CREATED, Body::from_stream(body)).into_response()
        }
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}
