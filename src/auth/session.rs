use anyhow::Context;
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::request::Parts,
    response::Redirect,
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::{error, warn};

use crate::{auth::repo::User, state::AppState};

/// Key under which the authenticated user's id is stored in the session.
pub const USER_ID_KEY: &str = "user_id";
/// Key holding queued one-time flash messages.
pub const FLASH_KEY: &str = "flash";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashKind {
    Success,
    Error,
}

/// One-time status message rendered on the next page view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flash {
    pub kind: FlashKind,
    pub message: String,
}

pub async fn current_user_id(session: &Session) -> anyhow::Result<Option<i64>> {
    session
        .get::<i64>(USER_ID_KEY)
        .await
        .context("read user id from session")
}

/// Binds the session to a user after a successful login.
pub async fn establish(session: &Session, user_id: i64) -> anyhow::Result<()> {
    session
        .insert(USER_ID_KEY, user_id)
        .await
        .context("write user id to session")
}

pub async fn push_flash(session: &Session, kind: FlashKind, message: &str) -> anyhow::Result<()> {
    let mut flashes: Vec<Flash> = session
        .get(FLASH_KEY)
        .await
        .context("read flash messages")?
        .unwrap_or_default();
    flashes.push(Flash {
        kind,
        message: message.to_string(),
    });
    session
        .insert(FLASH_KEY, flashes)
        .await
        .context("write flash messages")
}

/// Drains queued flash messages; reading is destructive so each message is
/// shown once.
pub async fn take_flash(session: &Session) -> anyhow::Result<Vec<Flash>> {
    Ok(session
        .remove::<Vec<Flash>>(FLASH_KEY)
        .await
        .context("take flash messages")?
        .unwrap_or_default())
}

/// Gate for protected routes: rehydrates the user referenced by the session
/// and redirects unauthenticated requests to the login page.
pub struct CurrentUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Redirect;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let session = match Session::from_request_parts(parts, state).await {
            Ok(session) => session,
            Err(rejection) => {
                error!(?rejection, "session layer missing or unreadable");
                return Err(Redirect::to("/login"));
            }
        };

        let user_id = match session.get::<i64>(USER_ID_KEY).await {
            Ok(Some(id)) => id,
            Ok(None) => return Err(Redirect::to("/login")),
            Err(e) => {
                error!(error = %e, "session read failed");
                return Err(Redirect::to("/login"));
            }
        };

        match User::find_by_id(&state.db, user_id).await {
            Ok(Some(user)) => Ok(CurrentUser(user)),
            Ok(None) => {
                // Stale cookie referencing a user that no longer exists.
                warn!(user_id, "session references unknown user");
                Err(Redirect::to("/login"))
            }
            Err(e) => {
                error!(error = %e, user_id, "failed to load session user");
                Err(Redirect::to("/login"))
            }
        }
    }
}
