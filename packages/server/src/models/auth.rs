use serde::Serialize;

/// The signed-in caller, as seen by this server.
#[derive(Serialize, utoipa::ToSchema)]
pub struct MeResponse {
    /// GitHub login carried by the session token.
    #[schema(example = "octocat")]
    pub login: String,
    /// Whether the access policy admits this login for uploads and deletions.
    pub allowed: bool,
}

impl From<common::service::Session> for MeResponse {
    fn from(session: common::service::Session) -> Self {
        Self {
            login: session.login,
            allowed: session.allowed,
        }
    }
}
