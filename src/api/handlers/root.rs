use axum::response::Html;

use super::auth::AuthContext;
use crate::api::pages;

// axum handler for /
pub async fn root(context: AuthContext) -> Html<String> {
    Html(pages::home_page(context.identity()))
}
