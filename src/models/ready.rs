use serde::{Deserialize, Serialize};

use super::user::User;

/// Data payload of the `READY` dispatch acknowledging a successful
/// identify: the session id needed for resume plus the authenticated user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadyData {
    pub session_id: String,
    pub user: User,
}

/// Data payload of the `invalid-session` record: `true` when the server
/// considers the session resumable.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvalidSessionData {
    pub resumable: bool,
}
