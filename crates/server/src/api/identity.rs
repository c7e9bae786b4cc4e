use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use purchasing_core::domain::user::{actor_has_capability, Actor, UserId};
use purchasing_core::errors::ApplicationError;
use purchasing_core::workflow::WorkflowError;

use super::error::ApiError;
use super::state::ApiState;

pub const USER_ID_HEADER: &str = "x-user-id";

/// The authenticated caller, resolved from the `X-User-Id` header.
#[derive(Clone, Debug)]
pub struct Caller(pub Actor);

impl Caller {
    /// Fails with 403 unless the caller holds `capability`.
    pub fn require(&self, capability: &'static str) -> Result<&Actor, ApiError> {
        if actor_has_capability(&self.0, capability) {
            Ok(&self.0)
        } else {
            Err(ApplicationError::from(WorkflowError::Forbidden {
                actor: self.0.user_id,
                capability,
            })
            .into())
        }
    }
}

fn parse_user_id(parts: &Parts) -> Result<UserId, ApiError> {
    let raw = parts
        .headers
        .get(USER_ID_HEADER)
        .ok_or_else(|| ApiError::unauthenticated("missing X-User-Id header"))?;

    raw.to_str()
        .ok()
        .and_then(|value| value.trim().parse::<i64>().ok())
        .map(UserId)
        .ok_or_else(|| ApiError::unauthenticated("X-User-Id header must be a numeric user id"))
}

impl FromRequestParts<ApiState> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ApiState,
    ) -> Result<Self, Self::Rejection> {
        let user_id = parse_user_id(parts)?;
        let actor = state.users.resolve_actor(user_id).await?.ok_or_else(|| {
            ApiError::unauthenticated(format!("user {user_id} is unknown or inactive"))
        })?;
        Ok(Self(actor))
    }
}

#[cfg(test)]
mod tests {
    use axum::http::{Request, StatusCode};

    use purchasing_core::domain::user::{Actor, UserId, SUPERVISOR};

    use super::{parse_user_id, Caller, USER_ID_HEADER};

    fn parts_with(value: Option<&str>) -> axum::http::request::Parts {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = value {
            builder = builder.header(USER_ID_HEADER, value);
        }
        builder.body(()).expect("request").into_parts().0
    }

    #[test]
    fn header_must_be_present_and_numeric() {
        assert_eq!(parse_user_id(&parts_with(Some(" 42 "))).expect("parsed"), UserId(42));

        let missing = parse_user_id(&parts_with(None)).expect_err("missing");
        assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

        let malformed = parse_user_id(&parts_with(Some("alice"))).expect_err("malformed");
        assert_eq!(malformed.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn require_checks_capability() {
        let supervisor = Caller(Actor::new(UserId(2), ["supervisor"]));
        assert!(supervisor.require(SUPERVISOR).is_ok());

        let regular = Caller(Actor::new(UserId(3), ["user"]));
        let error = regular.require(SUPERVISOR).expect_err("forbidden");
        assert_eq!(error.status(), StatusCode::FORBIDDEN);
    }
}
