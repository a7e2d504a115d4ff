use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Time-bounded grant letting `target_tenant_id` see part of `owner_tenant_id`'s fleet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mirror {
    pub id: Uuid,
    pub owner_tenant_id: Uuid,
    pub target_tenant_id: Uuid,
    pub vehicle_ids: Vec<Uuid>,
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
    pub target_type: String,
    pub permission_group_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Mirror {
    /// Active while `at` lies in `[start_at, end_at]`; a missing bound is open on that side.
    pub fn is_active_at(&self, at: DateTime<Utc>) -> bool {
        let started = self.start_at.is_none_or(|start| at >= start);
        let not_ended = self.end_at.is_none_or(|end| at <= end);
        started && not_ended
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewMirror {
    pub target_tenant_id: Uuid,
    pub vehicle_ids: Vec<Uuid>,
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub target_type: String,
    pub permission_group_id: Option<Uuid>,
}

/// Mirror grant already negotiated by the request boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MirrorContext {
    pub owner_tenant_id: Uuid,
    pub allowed_vehicle_ids: Vec<Uuid>,
    pub permission_group_id: Option<Uuid>,
}

impl From<&Mirror> for MirrorContext {
    fn from(mirror: &Mirror) -> Self {
        Self {
            owner_tenant_id: mirror.owner_tenant_id,
            allowed_vehicle_ids: mirror.vehicle_ids.clone(),
            permission_group_id: mirror.permission_group_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    fn mirror(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Mirror {
        Mirror {
            id: Uuid::now_v7(),
            owner_tenant_id: Uuid::now_v7(),
            target_tenant_id: Uuid::now_v7(),
            vehicle_ids: vec![],
            start_at: start,
            end_at: end,
            target_type: "insurer".to_string(),
            permission_group_id: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn window_bounds_are_inclusive() {
        let now = Utc::now();
        let m = mirror(Some(now), Some(now + TimeDelta::hours(1)));
        assert!(m.is_active_at(now));
        assert!(m.is_active_at(now + TimeDelta::hours(1)));
        assert!(!m.is_active_at(now - TimeDelta::seconds(1)));
        assert!(!m.is_active_at(now + TimeDelta::hours(2)));
    }

    #[test]
    fn open_bounds_are_unbounded() {
        let now = Utc::now();
        assert!(mirror(None, None).is_active_at(now));
        assert!(mirror(None, Some(now)).is_active_at(now - TimeDelta::days(3650)));
        assert!(mirror(Some(now), None).is_active_at(now + TimeDelta::days(3650)));
    }
}
