use axum::{extract::Extension, response::Html};
use tracing::instrument;

use super::auth::Identity;
use crate::api::pages;

/// Show the signed-in user's profile.
///
/// Only reachable behind `require_authenticated`, which provides the identity.
#[utoipa::path(
    get,
    path = "/userprofile",
    responses(
        (status = 200, description = "Profile page for the signed-in user"),
        (status = 303, description = "No valid session; redirect to /login")
    ),
    tag = "passgate"
)]
#[instrument(skip_all, fields(username = %identity.username))]
pub async fn profile(Extension(identity): Extension<Identity>) -> Html<String> {
    Html(pages::profile_page(&identity))
}
