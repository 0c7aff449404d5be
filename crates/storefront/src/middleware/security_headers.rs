//! Response security headers.
//!
//! Pages are plain server-rendered HTML with a same-origin stylesheet and no
//! scripts. Product images come from the backend's media host, so `img-src`
//! allows any HTTPS origin.

use axum::http::{
    HeaderName, HeaderValue,
    header::{CONTENT_SECURITY_POLICY, REFERRER_POLICY, X_CONTENT_TYPE_OPTIONS, X_FRAME_OPTIONS},
};
use tower_http::set_header::SetResponseHeaderLayer;

const CONTENT_SECURITY: &str = "default-src 'none'; \
     style-src 'self'; \
     img-src 'self' https: data:; \
     form-action 'self'; \
     base-uri 'self'; \
     frame-ancestors 'none'";

const PERMISSIONS: &str = "camera=(), microphone=(), geolocation=(), payment=()";

/// One layer per header. Values a handler already set are left alone.
#[must_use]
pub fn security_headers() -> Vec<SetResponseHeaderLayer<HeaderValue>> {
    [
        (X_FRAME_OPTIONS, "DENY"),
        (X_CONTENT_TYPE_OPTIONS, "nosniff"),
        (REFERRER_POLICY, "strict-origin-when-cross-origin"),
        (CONTENT_SECURITY_POLICY, CONTENT_SECURITY),
        (HeaderName::from_static("permissions-policy"), PERMISSIONS),
    ]
    .into_iter()
    .map(|(name, value)| {
        SetResponseHeaderLayer::if_not_present(name, HeaderValue::from_static(value))
    })
    .collect()
}
