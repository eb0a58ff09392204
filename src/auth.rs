use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::model::Course;

/// The authenticated user a request acts for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
}

impl Identity {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
        }
    }
}

/// Decides whether an identity may change a course and its chapters.
pub trait Authorizer: Send + Sync {
    fn can_edit_course(&self, identity: &Identity, course: &Course) -> bool;
}

/// Course owners may edit their courses. When a teacher list is configured
/// the owner must also be on it.
#[derive(Debug, Clone, Default)]
pub struct OwnerAuthorizer {
    teacher_ids: BTreeSet<String>,
}

impl OwnerAuthorizer {
    pub fn new(teacher_ids: impl IntoIterator<Item = String>) -> Self {
        Self {
            teacher_ids: teacher_ids.into_iter().collect(),
        }
    }

    pub fn is_teacher(&self, identity: &Identity) -> bool {
        self.teacher_ids.is_empty() || self.teacher_ids.contains(&identity.user_id)
    }
}

impl Authorizer for OwnerAuthorizer {
    fn can_edit_course(&self, identity: &Identity, course: &Course) -> bool {
        course.user_id == identity.user_id && self.is_teacher(identity)
    }
}
