//! Who is performing the current request.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The authenticated user behind a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: Uuid,
    pub username: String,
}

impl CurrentUser {
    pub fn new<S: Into<String>>(id: Uuid, username: S) -> Self {
        Self {
            id,
            username: username.into(),
        }
    }
}

/// Security context seam. The web layer resolves the caller from its
/// session and exposes it through this trait; services only ever ask for
/// the current user.
pub trait IdentityContext: Send + Sync {
    fn current_user(&self) -> CurrentUser;
}

/// Fixed identity, used by jobs and tests.
#[derive(Debug, Clone)]
pub struct StaticIdentity {
    user: CurrentUser,
}

impl StaticIdentity {
    pub fn new(user: CurrentUser) -> Self {
        Self { user }
    }
}

impl IdentityContext for StaticIdentity {
    fn current_user(&self) -> CurrentUser {
        self.user.clone()
    }
}
