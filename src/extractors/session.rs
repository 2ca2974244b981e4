//! Extract session id and user id from the request.

use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};

/// Header carrying the session id. Falls back to the `admin_session` cookie.
pub const SESSION_ID_HEADER: &str = "X-Session-ID";
pub const SESSION_COOKIE: &str = "admin_session";
/// Header carrying the authenticated user id.
pub const USER_ID_HEADER: &str = "X-User-ID";

/// Session id from `X-Session-ID`, else the `admin_session` cookie, else a fresh v4 uuid.
#[derive(Clone, Debug)]
pub struct AdminSession(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for AdminSession
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let from_header = header_value(parts, SESSION_ID_HEADER);
        let id = from_header
            .or_else(|| cookie_value(parts, SESSION_COOKIE))
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        Ok(AdminSession(id))
    }
}

/// Optional user id from `X-User-ID`.
#[derive(Clone, Debug)]
pub struct UserId(pub Option<String>);

#[async_trait]
impl<S> FromRequestParts<S> for UserId
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(UserId(header_value(parts, USER_ID_HEADER)))
    }
}

fn header_value(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn cookie_value(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get_all(axum::http::header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn session_of(req: Request<()>) -> String {
        let (mut parts, _) = req.into_parts();
        AdminSession::from_request_parts(&mut parts, &()).await.unwrap().0
    }

    #[tokio::test]
    async fn header_wins_over_cookie() {
        let req = Request::builder()
            .header(SESSION_ID_HEADER, "h1")
            .header("cookie", "admin_session=c1")
            .body(())
            .unwrap();
        assert_eq!(session_of(req).await, "h1");
    }

    #[tokio::test]
    async fn cookie_is_found_among_others() {
        let req = Request::builder()
            .header("cookie", "theme=dark; admin_session=c1")
            .body(())
            .unwrap();
        assert_eq!(session_of(req).await, "c1");
    }

    #[tokio::test]
    async fn missing_session_gets_a_fresh_id() {
        let id = session_of(Request::builder().body(()).unwrap()).await;
        assert!(uuid::Uuid::parse_str(&id).is_ok());
    }
}
