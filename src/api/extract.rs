//! Request extractors.

use std::convert::Infallible;
use std::net::SocketAddr;

use async_trait::async_trait;
use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;

use crate::flags::UserContext;

/// Header carrying the user id.
pub const USER_ID_HEADER: &str = "x-user-id";
/// Header carrying the user country.
pub const USER_COUNTRY_HEADER: &str = "x-user-country";

fn header_value<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts.headers.get(name).and_then(|v| v.to_str().ok())
}

#[async_trait]
impl<S> FromRequestParts<S> for UserContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let ip = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string());

        Ok(UserContext::new(
            header_value(parts, USER_ID_HEADER),
            header_value(parts, USER_COUNTRY_HEADER),
            ip,
        ))
    }
}
