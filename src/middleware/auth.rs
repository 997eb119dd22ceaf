use axum::extract::FromRequestParts;
use axum::http::{HeaderMap, request::Parts};
use headers::{Authorization, HeaderMapExt, authorization::Bearer};
use subtle::ConstantTimeEq;
use tracing::debug;

use crate::error::MonitorError;
use crate::router::MonitorState;

/// Check the operator key on an inbound request.
/// Accepts either:
/// - Header: `Authorization: Bearer <key>`
/// - Header: `x-operator-key: <key>`
pub fn ensure_operator(headers: &HeaderMap, expected: &str) -> Result<(), MonitorError> {
    let matches = |candidate: &str| bool::from(candidate.as_bytes().ct_eq(expected.as_bytes()));

    // 1) header: Authorization: Bearer
    if let Some(Authorization(bearer)) = headers.typed_get::<Authorization<Bearer>>()
        && matches(bearer.token())
    {
        return Ok(());
    }

    // 2) header: x-operator-key
    if let Some(hv) = headers.get("x-operator-key").and_then(|v| v.to_str().ok())
        && matches(hv.trim())
    {
        return Ok(());
    }

    debug!("operator key rejected");
    Err(MonitorError::OperatorUnauthorized)
}

/// Extractor guarding every operator route.
#[derive(Debug, Clone, Copy)]
pub struct RequireOperatorKey;

impl FromRequestParts<MonitorState> for RequireOperatorKey {
    type Rejection = MonitorError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &MonitorState,
    ) -> Result<Self, Self::Rejection> {
        ensure_operator(&parts.headers, &state.operator_key)?;
        Ok(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut h = HeaderMap::new();
        for (k, v) in pairs {
            h.insert(*k, HeaderValue::from_str(v).unwrap());
        }
        h
    }

    #[test]
    fn bearer_and_custom_header_are_accepted() {
        assert!(ensure_operator(&headers(&[("authorization", "Bearer s3cret")]), "s3cret").is_ok());
        assert!(ensure_operator(&headers(&[("x-operator-key", "s3cret")]), "s3cret").is_ok());
    }

    #[test]
    fn wrong_or_missing_key_is_rejected() {
        for h in [
            headers(&[]),
            headers(&[("authorization", "Bearer nope")]),
            headers(&[("x-operator-key", "s3cre")]),
            headers(&[("authorization", "Basic czNjcmV0")]),
        ] {
            assert!(matches!(
                ensure_operator(&h, "s3cret"),
                Err(MonitorError::OperatorUnauthorized)
            ));
        }
    }
}
