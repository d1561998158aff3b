use axum::extract::Request;
use axum::http::{HeaderValue, StatusCode, Uri, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

const HSTS: &str = "max-age=63072000; includeSubDomains";

/// Enforce HTTPS behind a TLS-terminating proxy.
///
/// Requests the proxy marks as `x-forwarded-proto: http` are redirected with
/// 308 so chat and lookup POSTs keep their method and body. Every response
/// carries HSTS.
pub async fn require_https(req: Request, next: Next) -> Response {
    if let Some(target) = https_target(&req) {
        let mut response =
            (StatusCode::PERMANENT_REDIRECT, [(header::LOCATION, target)]).into_response();
        add_hsts_header(&mut response);
        return response;
    }

    let mut response = next.run(req).await;
    add_hsts_header(&mut response);
    response
}

fn https_target(req: &Request) -> Option<String> {
    let proto = req
        .headers()
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("https");
    if !proto.eq_ignore_ascii_case("http") {
        return None;
    }

    let host = req
        .headers()
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    let path_and_query = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    let target = format!("https://{host}{path_and_query}");
    target.parse::<Uri>().ok().map(|uri| uri.to_string())
}

fn add_hsts_header(response: &mut Response) {
    response
        .headers_mut()
        .insert(header::STRICT_TRANSPORT_SECURITY, HeaderValue::from_static(HSTS));
}
