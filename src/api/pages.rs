//! Minimal server-rendered pages.
//!
//! Every user-supplied value goes through [`escape`] before it is written
//! into markup.

use axum::http::StatusCode;
use std::fmt::Write as _;

use crate::api::handlers::auth::{FieldError, Identity};

/// Values echoed back into the registration form after a failed submission.
#[derive(Debug, Default)]
pub struct RegisterForm<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub phone: &'a str,
}

#[must_use]
pub fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn layout(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head><meta charset=\"utf-8\"><title>{}</title></head>\n<body>\n<nav><a href=\"/\">Home</a> | <a href=\"/register\">Register</a> | <a href=\"/login\">Login</a> | <a href=\"/logout\">Logout</a></nav>\n{body}\n</body>\n</html>\n",
        escape(title)
    )
}

#[must_use]
pub fn home_page(identity: Option<&Identity>) -> String {
    let greeting = match identity {
        Some(identity) => format!(
            "<p>Signed in as {}. <a href=\"/userprofile\">Profile</a></p>",
            escape(&identity.username)
        ),
        None => "<p>You are not signed in.</p>".to_string(),
    };
    layout("Home", &format!("<h1>Welcome</h1>\n{greeting}"))
}

#[must_use]
pub fn login_page() -> String {
    layout(
        "Login",
        "<h1>Login</h1>\n<form method=\"post\" action=\"/login\">\n<label>Username <input name=\"username\" autocomplete=\"username\"></label>\n<label>Password <input name=\"password\" type=\"password\" autocomplete=\"current-password\"></label>\n<button type=\"submit\">Login</button>\n</form>",
    )
}

#[must_use]
pub fn register_page(form: &RegisterForm<'_>, errors: &[FieldError], notice: Option<&str>) -> String {
    let mut body = String::from("<h1>Register</h1>\n");
    if let Some(notice) = notice {
        let _ = writeln!(body, "<p class=\"alert\">{}</p>", escape(notice));
    }
    if !errors.is_empty() {
        body.push_str("<ul class=\"alert\">\n");
        for error in errors {
            let _ = writeln!(
                body,
                "<li data-field=\"{}\">{}</li>",
                error.field,
                escape(error.message)
            );
        }
        body.push_str("</ul>\n");
    }
    let _ = write!(
        body,
        "<form method=\"post\" action=\"/register\">\n<label>Username <input name=\"username\" value=\"{}\"></label>\n<label>Password <input name=\"password\" type=\"password\" autocomplete=\"new-password\"></label>\n<label>Email <input name=\"email\" type=\"email\" value=\"{}\"></label>\n<label>Phone <input name=\"phone\" value=\"{}\"></label>\n<button type=\"submit\">Register</button>\n</form>",
        escape(form.username),
        escape(form.email),
        escape(form.phone)
    );
    layout("Register", &body)
}

#[must_use]
pub fn profile_page(identity: &Identity) -> String {
    layout(
        "Profile",
        &format!(
            "<h1>Profile</h1>\n<dl>\n<dt>Username</dt><dd>{}</dd>\n<dt>Email</dt><dd>{}</dd>\n<dt>Phone</dt><dd>{}</dd>\n</dl>",
            escape(&identity.username),
            escape(&identity.email),
            escape(&identity.phone)
        ),
    )
}

#[must_use]
pub fn error_page(status: StatusCode) -> String {
    let message = match status {
        StatusCode::TOO_MANY_REQUESTS => "Too many requests",
        _ => "Something went wrong. Please try again later.",
    };
    layout(
        status.canonical_reason().unwrap_or("Error"),
        &format!("<h1>{}</h1>\n<p>{message}</p>", status.as_u16()),
    )
}
