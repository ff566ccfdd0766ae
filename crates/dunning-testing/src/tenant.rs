//! Services behind the gateway receive `x-organisation-id` and, for user
//! calls, `x-actor-id`. `MockTenant` produces those headers directly so no
//! gateway is needed in tests.

use axum::http::{HeaderMap, HeaderName, HeaderValue};
use uuid::Uuid;

use dunning_tenant_types::identity::{ACTOR_HEADER, ORGANISATION_HEADER};

/// Tenant identity injected into test requests.
#[derive(Debug, Clone, Copy)]
pub struct MockTenant {
    pub organisation_id: Uuid,
    pub actor_id: Option<Uuid>,
}

impl MockTenant {
    pub fn new(organisation_id: Uuid) -> Self {
        Self {
            organisation_id,
            actor_id: None,
        }
    }

    /// A fresh organisation with a calling user.
    pub fn random() -> Self {
        Self {
            organisation_id: Uuid::new_v4(),
            actor_id: Some(Uuid::new_v4()),
        }
    }

    /// Headers as the gateway would inject them.
    pub fn headers(&self) -> HeaderMap {
        let mut map = HeaderMap::new();
        map.insert(
            HeaderName::from_static(ORGANISATION_HEADER),
            HeaderValue::from_str(&self.organisation_id.to_string()).unwrap(),
        );
        if let Some(actor_id) = self.actor_id {
            map.insert(
                HeaderName::from_static(ACTOR_HEADER),
                HeaderValue::from_str(&actor_id.to_string()).unwrap(),
            );
        }
        map
    }

    pub fn organisation_header(&self) -> (HeaderName, HeaderValue) {
        (
            HeaderName::from_static(ORGANISATION_HEADER),
            HeaderValue::from_str(&self.organisation_id.to_string()).unwrap(),
        )
    }
}
