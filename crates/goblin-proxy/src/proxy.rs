use axum::body::Bytes;
use axum::extract::{Request, State};
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use tracing::warn;

/// Where one reverse-proxy listener forwards to.
#[derive(Clone)]
pub struct Upstream {
    pub client: reqwest::Client,
    pub host: String,
    pub port: u16,
}

impl Upstream {
    fn target_url(&self, uri: &Uri) -> String {
        let path_and_query = uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        format!("http://{}:{}{path_and_query}", self.host, self.port)
    }
}

/// Forwards `req` to the upstream host:port unchanged, rewriting the
/// `Host` header, and copies the upstream status/headers/body back.
/// Connection failures to the upstream become a `502 Bad Gateway`; the
/// lease backing this listener is never torn down because of it.
pub async fn forward(State(upstream): State<Upstream>, req: Request) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let mut headers = req.headers().clone();

    let body = match axum::body::to_bytes(req.into_body(), usize::MAX).await {
        Ok(body) => body,
        Err(e) => {
            warn!(error = %e, "failed to buffer request body for proxying");
            return (StatusCode::BAD_GATEWAY, "failed to read request body").into_response();
        }
    };

    headers.insert(
        reqwest::header::HOST,
        format!("{}:{}", upstream.host, upstream.port)
            .parse()
            .expect("host header value"),
    );

    let target = upstream.target_url(&uri);
    let upstream_method = reqwest::Method::from_bytes(method.as_str().as_bytes())
        .unwrap_or(reqwest::Method::GET);

    let response = upstream
        .client
        .request(upstream_method, &target)
        .headers(headers)
        .body(body)
        .send()
        .await;

    match response {
        Ok(resp) => translate_response(resp).await,
        Err(e) => {
            warn!(target = %target, error = %e, "upstream request failed");
            (StatusCode::BAD_GATEWAY, "upstream unreachable").into_response()
        }
    }
}

async fn translate_response(resp: reqwest::Response) -> Response {
    let status = resp.status();
    let headers: HeaderMap = resp.headers().clone();
    let body = match resp.bytes().await {
        Ok(body) => body,
        Err(e) => {
            warn!(error = %e, "failed to read upstream response body");
            return (StatusCode::BAD_GATEWAY, "failed to read upstream response").into_response();
        }
    };

    let mut response = Response::builder().status(status);
    for (name, value) in headers.iter() {
        response = response.header(name, value);
    }
    response
        .body(axum::body::Body::from(Bytes::from(body)))
        .unwrap_or_else(|_| {
            (StatusCode::BAD_GATEWAY, "malformed upstream response").into_response()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;
    use axum::Router;

    async fn spawn_upstream(body: &'static str) -> std::net::SocketAddr {
        let app = Router::new().route("/hello", get(move || async move { body }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    #[tokio::test]
    async fn forwards_successful_response() {
        let addr = spawn_upstream("hello from upstream").await;
        let upstream = Upstream {
            client: reqwest::Client::new(),
            host: "127.0.0.1".to_string(),
            port: addr.port(),
        };

        let req = Request::builder()
            .method("GET")
            .uri("/hello")
            .body(axum::body::Body::empty())
            .unwrap();

        let response = forward(State(upstream), req).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"hello from upstream");
    }

    #[tokio::test]
    async fn unreachable_upstream_returns_502() {
        let upstream = Upstream {
            client: reqwest::Client::new(),
            host: "127.0.0.1".to_string(),
            port: 1, // nothing listens on a privileged port in the test sandbox
        };

        let req = Request::builder()
            .method("GET")
            .uri("/hello")
            .body(axum::body::Body::empty())
            .unwrap();

        let response = forward(State(upstream), req).await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
