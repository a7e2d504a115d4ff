//! Actor extraction at the request boundary.
//!
//! Authentication happens upstream; the gateway in front of this service
//! forwards the verified identity as headers.

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::request::Parts;
use chrono::Utc;
use uuid::Uuid;

use crate::access::{AccessScope, Actor, ResolveOptions};
use crate::error::AppError;
use crate::models::MirrorContext;
use crate::state::{AppState, SharedState};

pub const ACTOR_ID_HEADER: &str = "x-actor-id";
pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";
pub const TENANT_ID_HEADER: &str = "x-tenant-id";
/// Operate on another tenant's data (admins only).
pub const SCOPE_TENANT_HEADER: &str = "x-scope-tenant";
/// Operate as a mirror of this owner tenant.
pub const MIRROR_OWNER_HEADER: &str = "x-mirror-owner";

const ADMIN_ROLE: &str = "admin";

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub actor: Actor,
    pub requested_tenant_id: Option<Uuid>,
    /// Negotiated against an active mirror grant during extraction.
    pub mirror: Option<MirrorContext>,
}

impl AuthUser {
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.actor.role == ADMIN_ROLE {
            Ok(())
        } else {
            Err(AppError::Forbidden("Admin access required".to_string()))
        }
    }

    /// Tenant that owns what this request creates or changes. Mirror access is read-only.
    pub fn write_tenant(&self) -> Result<Uuid, AppError> {
        if self.mirror.is_some() {
            return Err(AppError::Forbidden(
                "Mirrored access is read-only".to_string(),
            ));
        }
        Ok(self.requested_tenant_id.unwrap_or(self.actor.tenant_id))
    }

    /// Tenant whose alerts and event configuration the request works on.
    pub fn alert_tenant(&self) -> Uuid {
        self.requested_tenant_id.unwrap_or(self.actor.tenant_id)
    }

    /// Unlinked devices belong to no vehicle, so only an owner acting for itself sees them.
    pub fn sees_unlinked_stock(&self, scope: &AccessScope) -> bool {
        self.mirror.is_none() && !scope.access.is_receiver
    }

    pub fn scope(&self, state: &AppState, include_mirrored: bool) -> AccessScope {
        state.access().resolve_scope(
            &self.actor,
            self.requested_tenant_id,
            self.mirror.as_ref(),
            ResolveOptions {
                include_mirrored,
                at: Utc::now(),
            },
        )
    }
}

impl FromRequestParts<SharedState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        let headers = &parts.headers;

        let id = uuid_header(headers, ACTOR_ID_HEADER)?
            .ok_or_else(|| AppError::Unauthorized("Missing actor identity".to_string()))?;
        let tenant_id = uuid_header(headers, TENANT_ID_HEADER)?
            .ok_or_else(|| AppError::Unauthorized("Missing actor tenant".to_string()))?;
        let role = header_str(headers, ACTOR_ROLE_HEADER)?
            .unwrap_or("operator")
            .to_string();

        let actor = Actor {
            id,
            role,
            tenant_id,
        };

        let requested_tenant_id = match uuid_header(headers, SCOPE_TENANT_HEADER)? {
            Some(requested) if requested == actor.tenant_id => None,
            Some(requested) if actor.role == ADMIN_ROLE => Some(requested),
            Some(_) => {
                return Err(AppError::Forbidden(
                    "Only admins may act on another tenant".to_string(),
                ));
            }
            None => None,
        };

        let mirror = match uuid_header(headers, MIRROR_OWNER_HEADER)? {
            Some(owner) => {
                let grant = state
                    .mirrors
                    .find_active_grant(owner, actor.tenant_id, Utc::now())
                    .ok_or_else(|| {
                        AppError::Forbidden("No active mirror from this tenant".to_string())
                    })?;
                Some(MirrorContext::from(&grant))
            }
            None => None,
        };

        Ok(AuthUser {
            actor,
            requested_tenant_id,
            mirror,
        })
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Result<Option<&'a str>, AppError> {
    headers
        .get(name)
        .map(|value| {
            value
                .to_str()
                .map(str::trim)
                .map_err(|_| AppError::BadRequest(format!("Invalid {name} header")))
        })
        .transpose()
        .map(|value| value.filter(|v| !v.is_empty()))
}

fn uuid_header(headers: &HeaderMap, name: &str) -> Result<Option<Uuid>, AppError> {
    header_str(headers, name)?
        .map(|value| {
            value
                .parse()
                .map_err(|_| AppError::BadRequest(format!("Invalid {name} header")))
        })
        .transpose()
}
