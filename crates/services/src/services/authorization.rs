//! Access decisions for projects, tickets, and comments.
//!
//! Every predicate here is pure and synchronous: callers resolve the
//! entities first (the server does this in its model-loader middleware)
//! and pass snapshots in. A missing entity is a `NotFound` decision, never
//! `Forbidden`, so callers can distinguish "does not exist" from "exists
//! but you may not touch it".
//!
//! Access is membership-scoped. The global `User.role` field plays no part
//! in any decision; only a project's admin/member relationships matter.

use serde::Serialize;
use ts_rs::TS;
use uuid::Uuid;

/// The authorization-relevant slice of a project: who administers it and
/// who belongs to it. The admin is always present in `member_ids`.
#[derive(Debug, Clone)]
pub struct ProjectAccess {
    pub admin_id: Uuid,
    pub member_ids: Vec<Uuid>,
}

impl ProjectAccess {
    pub fn new(admin_id: Uuid, member_ids: Vec<Uuid>) -> Self {
        Self {
            admin_id,
            member_ids,
        }
    }

    pub fn is_admin(&self, user_id: Uuid) -> bool {
        self.admin_id == user_id
    }

    pub fn is_member(&self, user_id: Uuid) -> bool {
        self.member_ids.contains(&user_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "kebab-case")]
pub enum DecisionReason {
    Ok,
    NotFound,
    Forbidden,
}

/// Outcome of an access check. `NotFound` and `Forbidden` are both
/// terminal; there is no partial or retryable state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
pub struct Decision {
    pub allowed: bool,
    pub reason: DecisionReason,
}

impl Decision {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: DecisionReason::Ok,
        }
    }

    pub fn forbidden() -> Self {
        Self {
            allowed: false,
            reason: DecisionReason::Forbidden,
        }
    }

    pub fn not_found() -> Self {
        Self {
            allowed: false,
            reason: DecisionReason::NotFound,
        }
    }

    fn allow_if(condition: bool) -> Self {
        if condition {
            Self::allow()
        } else {
            Self::forbidden()
        }
    }
}

/// View a project: admin or any team member.
pub fn view_project(actor: Uuid, access: &ProjectAccess) -> Decision {
    Decision::allow_if(access.is_admin(actor) || access.is_member(actor))
}

/// Update or delete a project: admin only.
pub fn manage_project(actor: Uuid, access: &ProjectAccess) -> Decision {
    Decision::allow_if(access.is_admin(actor))
}

/// Add a team member: admin only.
pub fn add_member(actor: Uuid, access: &ProjectAccess) -> Decision {
    Decision::allow_if(access.is_admin(actor))
}

/// Remove a team member: admin only, and removing the admin itself is
/// denied no matter who asks.
pub fn remove_member(actor: Uuid, access: &ProjectAccess, target: Uuid) -> Decision {
    if target == access.admin_id {
        return Decision::forbidden();
    }
    Decision::allow_if(access.is_admin(actor))
}

/// View, create, or update tickets in a project; also gates attachment
/// upload/delete and comment viewing/creation on those tickets. The admin
/// is always a member, so no special case is needed.
pub fn access_tickets(actor: Uuid, access: &ProjectAccess) -> Decision {
    Decision::allow_if(access.is_member(actor))
}

/// Delete a ticket: its creator or the owning project's admin.
pub fn delete_ticket(actor: Uuid, access: &ProjectAccess, created_by: Uuid) -> Decision {
    Decision::allow_if(actor == created_by || access.is_admin(actor))
}

/// Update or delete a comment: its author only, project admin included in
/// the exclusion.
pub fn modify_comment(actor: Uuid, author_id: Uuid) -> Decision {
    Decision::allow_if(actor == author_id)
}

/// Assignment validation: the assignee must be a member of the ticket's
/// project at assignment time. A violation is a validation failure on the
/// request, not an authorization failure, and membership is not
/// re-checked if the assignee later leaves the project.
pub fn assignee_is_member(assignee: Option<Uuid>, access: &ProjectAccess) -> bool {
    match assignee {
        Some(user_id) => access.is_member(user_id),
        None => true,
    }
}
