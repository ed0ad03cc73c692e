use axum::{
    async_trait,
    extract::{FromRequestParts, Request},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};

/// The `User-Agent` header of the current request, if it sent one.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UserAgent(pub Option<String>);

pub async fn user_agent_middleware(mut req: Request, next: Next) -> Response {
    let agent = req
        .headers()
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);
    req.extensions_mut().insert(UserAgent(agent));
    next.run(req).await
}

#[async_trait]
impl<S> FromRequestParts<S> for UserAgent
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<UserAgent>().cloned().unwrap_or_default())
    }
}
