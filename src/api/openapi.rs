use super::handlers::{auth, health, profile};
use axum::middleware;
use utoipa::openapi::{Contact, InfoBuilder, License, OpenApiBuilder, Tag};
use utoipa_axum::{router::OpenApiRouter, routes};

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    let (_router, openapi) = api_router().split_for_parts();
    openapi
}

/// Build the router that also drives the `OpenAPI` document.
///
/// Routes added outside (like `/` or `GET /logout`) are not documented.
pub(crate) fn api_router() -> OpenApiRouter {
    let protected = OpenApiRouter::new()
        .routes(routes!(profile::profile))
        .route_layer(middleware::from_fn(auth::require_authenticated));

    let mut router = OpenApiRouter::with_openapi(cargo_openapi())
        .routes(routes!(health::health))
        .routes(routes!(auth::register_form, auth::register))
        .routes(routes!(auth::login_form, auth::login))
        .routes(routes!(auth::logout))
        .merge(protected);

    let mut passgate_tag = Tag::new("passgate");
    passgate_tag.description = Some("Pages for signed-in users".to_string());

    let mut auth_tag = Tag::new("auth");
    auth_tag.description = Some("Registration, login and logout".to_string());

    let mut health_tag = Tag::new("health");
    health_tag.description = Some("Liveness and store reachability".to_string());

    router.get_openapi_mut().tags = Some(vec![passgate_tag, auth_tag, health_tag]);

    router
}

fn cargo_openapi() -> utoipa::openapi::OpenApi {
    let mut info = InfoBuilder::new()
        .title(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .description(optional_str(env!("CARGO_PKG_DESCRIPTION")))
        .build();

    info.contact = cargo_contact();
    info.license = cargo_license();

    OpenApiBuilder::new().info(info).build()
}

fn cargo_contact() -> Option<Contact> {
    // Cargo authors are `;` separated and may include "Name <email>".
    let authors = env!("CARGO_PKG_AUTHORS");
    let primary = authors.split(';').next().map(str::trim)?;
    let (name, email) = parse_author(primary);
    if name.is_none() && email.is_none() {
        return None;
    }

    let mut contact = Contact::new();
    contact.name = name.map(str::to_string);
    contact.email = email.map(str::to_string);
    Some(contact)
}

fn cargo_license() -> Option<License> {
    let identifier = optional_str(env!("CARGO_PKG_LICENSE"))?;
    let mut license = License::new(identifier);
    license.identifier = Some(identifier.to_string());
    Some(license)
}

fn optional_str(value: &'static str) -> Option<&'static str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

fn parse_author(author: &str) -> (Option<&str>, Option<&str>) {
    fn non_empty(s: &str) -> Option<&str> {
        (!s.is_empty()).then_some(s)
    }

    match author.split_once('<') {
        Some((name, rest)) => (
            non_empty(name.trim()),
            non_empty(rest.trim_end_matches('>').trim()),
        ),
        None => (non_empty(author.trim()), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_info_from_cargo() {
        let doc = openapi();
        assert_eq!(doc.info.title, env!("CARGO_PKG_NAME"));
        assert_eq!(doc.info.version, env!("CARGO_PKG_VERSION"));

        let contact = doc.info.contact;
        assert!(contact.is_some());
        if let Some(contact) = contact {
            assert_eq!(contact.name.as_deref(), Some("Team Passgate"));
            assert_eq!(contact.email.as_deref(), Some("team@passgate.dev"));
        }

        let license = doc.info.license;
        assert!(license.is_some());
        if let Some(license) = license {
            assert_eq!(license.name, "BSD-3-Clause");
        }
    }

    #[test]
    fn openapi_documents_form_routes() {
        let doc = openapi();
        for path in ["/health", "/register", "/login", "/logout", "/userprofile"] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
        let tags = doc.tags.unwrap_or_default();
        assert!(tags.iter().any(|tag| tag.name == "auth"));
    }

    #[test]
    fn parse_author_splits_name_and_email() {
        assert_eq!(
            parse_author("Jane Doe <jane@x.dev>"),
            (Some("Jane Doe"), Some("jane@x.dev"))
        );
        assert_eq!(parse_author("Jane"), (Some("Jane"), None));
        assert_eq!(parse_author(""), (None, None));
    }
}
