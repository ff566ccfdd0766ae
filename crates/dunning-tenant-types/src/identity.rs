//! Gateway-injected tenant headers extractor.

use axum::extract::FromRequestParts;
use http::StatusCode;
use http::request::Parts;
use uuid::Uuid;

use dunning_domain::actor::Actor;

pub const ORGANISATION_HEADER: &str = "x-organisation-id";
pub const ACTOR_HEADER: &str = "x-actor-id";

/// Tenant injected by the gateway via `x-organisation-id`, with the calling
/// user in the optional `x-actor-id`.
///
/// Returns 401 if the organisation header is absent or not a UUID, or if
/// `x-actor-id` is present but malformed.
#[derive(Debug, Clone, Copy)]
pub struct TenantHeaders {
    pub organisation_id: Uuid,
    pub actor_id: Option<Uuid>,
}

impl TenantHeaders {
    /// The calling user as an audit actor.
    pub fn actor(&self) -> Actor {
        Actor::user(self.actor_id)
    }
}

fn header_uuid(parts: &Parts, name: &str) -> Option<Result<Uuid, ()>> {
    parts.headers.get(name).map(|v| {
        v.to_str()
            .ok()
            .and_then(|s| s.parse::<Uuid>().ok())
            .ok_or(())
    })
}

impl<S> FromRequestParts<S> for TenantHeaders
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    // axum-core 0.5 declares `fn -> impl Future + Send`; read the headers
    // synchronously and hand back a 'static future.
    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        let organisation_id = header_uuid(parts, ORGANISATION_HEADER);
        let actor_id = header_uuid(parts, ACTOR_HEADER);

        async move {
            let organisation_id = organisation_id
                .ok_or(StatusCode::UNAUTHORIZED)?
                .map_err(|()| StatusCode::UNAUTHORIZED)?;
            let actor_id = actor_id
                .transpose()
                .map_err(|()| StatusCode::UNAUTHORIZED)?;
            Ok(Self {
                organisation_id,
                actor_id,
            })
        }
    }
}
