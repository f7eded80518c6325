//! Reverse proxy to the local WordPress server.

use axum::body::Body;
use axum::extract::Request;
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use tracing::{debug, warn};
use url::Url;

use crate::livereload::inject;

/// Largest request body forwarded upstream.
const MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

/// Headers that describe a single hop and must not be forwarded.
const HOP_HEADERS: &[header::HeaderName] = &[
    header::CONNECTION,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
    header::TE,
    header::TRAILER,
    header::PROXY_AUTHORIZATION,
];

/// Client for upstream requests. Redirects are passed to the browser.
pub fn client() -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
}

/// Append the request path to the upstream, keeping any upstream path prefix
/// (`http://localhost:8888/site/` + `/wp-admin/` → `.../site/wp-admin/`).
pub fn upstream_url(upstream: &Url, target: &str) -> Result<Url, url::ParseError> {
    let base = upstream.as_str().trim_end_matches('/');
    let target = if target.starts_with('/') {
        target.to_string()
    } else {
        format!("/{target}")
    };
    Url::parse(&format!("{base}{target}"))
}

fn strip_hop_headers(headers: &mut HeaderMap) {
    for name in HOP_HEADERS {
        headers.remove(name);
    }
}

/// Rewrites absolute upstream URLs so the browser stays on the dev server.
///
/// WordPress renders every link with its site URL; the upstream base
/// (scheme, host and any path prefix) is swapped for `http://<host>` of the
/// incoming request.
#[derive(Debug)]
pub struct Rewriter {
    upstream_base: String,
    upstream_prefix: String,
    local_base: String,
}

impl Rewriter {
    pub fn new(upstream: &Url, request_host: &str) -> Self {
        Self {
            upstream_base: upstream.as_str().trim_end_matches('/').to_string(),
            upstream_prefix: upstream.path().trim_end_matches('/').to_string(),
            local_base: format!("http://{request_host}"),
        }
    }

    /// Replace the upstream base in a text body, including the `\/`-escaped
    /// form WordPress writes into inline JSON.
    pub fn body(&self, text: &str) -> String {
        let escaped_upstream = self.upstream_base.replace('/', "\\/");
        let escaped_local = self.local_base.replace('/', "\\/");
        text.replace(&self.upstream_base, &self.local_base)
            .replace(&escaped_upstream, &escaped_local)
    }

    /// Rewrite a `Location` header value.
    pub fn location(&self, value: &str) -> String {
        match value.strip_prefix(self.upstream_base.as_str()) {
            Some(rest) if rest.is_empty() || rest.starts_with(['/', '?', '#']) => {
                format!("{}{rest}", self.local_base)
            }
            _ => value.to_string(),
        }
    }

    /// Drop the `Domain` attribute and strip the upstream path prefix from
    /// `Path`, so the cookie binds to the dev server.
    pub fn set_cookie(&self, value: &str) -> String {
        let mut parts = vec![];
        for (i, part) in value.split(';').enumerate() {
            let trimmed = part.trim();
            if i == 0 {
                parts.push(trimmed.to_string());
                continue;
            }
            let lower = trimmed.to_ascii_lowercase();
            if lower.starts_with("domain=") {
                continue;
            }
            if lower.starts_with("path=") && !self.upstream_prefix.is_empty() {
                let path = &trimmed["path=".len()..];
                match path.strip_prefix(self.upstream_prefix.as_str()) {
                    Some("") => {
                        parts.push("path=/".to_string());
                        continue;
                    }
                    Some(rest) if rest.starts_with('/') => {
                        parts.push(format!("path={rest}"));
                        continue;
                    }
                    _ => {}
                }
            }
            parts.push(trimmed.to_string());
        }
        parts.join("; ")
    }

    fn headers(&self, headers: &mut HeaderMap) {
        if let Some(location) = headers
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(|v| self.location(v))
            .and_then(|v| HeaderValue::from_str(&v).ok())
        {
            headers.insert(header::LOCATION, location);
        }

        let cookies: Vec<HeaderValue> = headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .filter_map(|v| HeaderValue::from_str(&self.set_cookie(v)).ok())
            .collect();
        if !cookies.is_empty() {
            headers.remove(header::SET_COOKIE);
            for cookie in cookies {
                headers.append(header::SET_COOKIE, cookie);
            }
        }
    }
}

/// Lower-cased media type without parameters.
fn media_type(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase())
}

fn is_rewritable(media_type: &str) -> bool {
    media_type.starts_with("text/")
        || matches!(
            media_type,
            "application/javascript" | "application/json" | "application/xml"
        )
}

pub(crate) async fn forward(client: &reqwest::Client, upstream: &Url, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let target = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    let url = match upstream_url(upstream, target) {
        Ok(url) => url,
        Err(e) => {
            warn!(target, error = %e, "bad proxy target");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    let rewriter = parts
        .headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(|host| Rewriter::new(upstream, host));

    let body = match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(error = %e, "request body rejected");
            return StatusCode::PAYLOAD_TOO_LARGE.into_response();
        }
    };

    let mut headers = parts.headers;
    strip_hop_headers(&mut headers);
    headers.remove(header::HOST);
    // Bodies are rewritten as plain text.
    headers.remove(header::ACCEPT_ENCODING);

    let upstream_response = match client
        .request(parts.method, url.clone())
        .headers(headers)
        .body(body)
        .send()
        .await
    {
        Ok(resp) => resp,
        Err(e) => {
            warn!(%url, error = %e, "upstream unreachable");
            return (
                StatusCode::BAD_GATEWAY,
                format!("upstream {upstream} is not reachable: {e}"),
            )
                .into_response();
        }
    };

    let status = upstream_response.status();
    let mut headers = upstream_response.headers().clone();
    strip_hop_headers(&mut headers);
    if let Some(rewriter) = &rewriter {
        rewriter.headers(&mut headers);
    }

    let media_type = media_type(&headers).unwrap_or_default();

    let bytes = match upstream_response.bytes().await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(%url, error = %e, "upstream body failed");
            return StatusCode::BAD_GATEWAY.into_response();
        }
    };
    debug!(%url, %status, bytes = bytes.len(), "proxied");

    let text = if is_rewritable(&media_type) {
        std::str::from_utf8(&bytes).ok()
    } else {
        None
    };
    let body = match text {
        Some(text) => {
            let mut text = match &rewriter {
                Some(rewriter) => rewriter.body(text),
                None => text.to_string(),
            };
            if media_type == "text/html" {
                text = inject(&text);
            }
            headers.remove(header::CONTENT_LENGTH);
            Body::from(text)
        }
        None => Body::from(bytes),
    };

    let mut response = Response::new(body);
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}
