//! Response composition.
//!
//! Turns the engine's internal response [`Message`] into its transport
//! shape: a redirect location with parameters appended to the query string
//! or fragment, an auto-submitting HTML form for `form_post`, or a JSON
//! body for the token and userinfo endpoints.

use serde_json::{Map, Value};
use time::OffsetDateTime;
use url::Url;

use crate::constants::{claims, params, response_modes};
use crate::error::EngineError;
use crate::message::Message;
use crate::pipeline::UserinfoClaims;

/// How an authorization response travels back to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseMode {
    /// Parameters appended to the redirect URI's query string.
    Query,
    /// Parameters appended to the redirect URI's fragment.
    Fragment,
    /// Parameters delivered by an auto-submitting HTML form POST.
    FormPost,
}

impl ResponseMode {
    /// Resolves the delivery mode for a validated request, applying the
    /// default rules when `response_mode` is absent.
    #[must_use]
    pub fn negotiate(request: &Message) -> Self {
        if request.is_form_post_response_mode() {
            Self::FormPost
        } else if request.is_fragment_response_mode() {
            Self::Fragment
        } else {
            Self::Query
        }
    }

    /// Wire name of the mode.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Query => response_modes::QUERY,
            Self::Fragment => response_modes::FRAGMENT,
            Self::FormPost => response_modes::FORM_POST,
        }
    }
}

/// Seconds until `expires_at`, rounded up.
#[must_use]
pub fn expires_in(expires_at: OffsetDateTime, now: OffsetDateTime) -> i64 {
    let remaining = expires_at - now;
    let mut seconds = remaining.whole_seconds();
    if remaining.subsec_nanoseconds() > 0 {
        seconds += 1;
    }
    seconds
}

/// Builds the redirect location delivering `response` in query or fragment
/// mode. The `state` the client sent must already be set on the response.
pub fn redirect_location(
    redirect_uri: &str,
    response: &Message,
    mode: ResponseMode,
) -> Result<String, EngineError> {
    let mut location = Url::parse(redirect_uri)
        .map_err(|_| EngineError::internal("redirect_uri was validated but failed to parse"))?;

    match mode {
        ResponseMode::Query => {
            let mut pairs = location.query_pairs_mut();
            for (key, value) in response.iter() {
                pairs.append_pair(key, value);
            }
            drop(pairs);
        }

        ResponseMode::Fragment => {
            let mut serializer = url::form_urlencoded::Serializer::new(String::new());
            for (key, value) in response.iter() {
                serializer.append_pair(key, value);
            }
            location.set_fragment(Some(&serializer.finish()));
        }

        ResponseMode::FormPost => {
            return Err(EngineError::internal(
                "form_post responses are rendered as HTML, not a redirect",
            ));
        }
    }

    Ok(location.into())
}

/// Renders `response` as a self-submitting HTML form posting to
/// `redirect_uri`.
#[must_use]
pub fn form_post_page(redirect_uri: &str, response: &Message) -> String {
    let mut page = String::with_capacity(512);
    page.push_str("<!doctype html>\n<html>\n<head><title>Working...</title></head>\n");
    page.push_str("<body onload=\"document.forms[0].submit()\">\n");
    page.push_str("<form method=\"post\" action=\"");
    page.push_str(&escape_html(redirect_uri));
    page.push_str("\">\n");

    for (key, value) in response.iter() {
        page.push_str("<input type=\"hidden\" name=\"");
        page.push_str(&escape_html(key));
        page.push_str("\" value=\"");
        page.push_str(&escape_html(value));
        page.push_str("\" />\n");
    }

    page.push_str("<noscript><button type=\"submit\">Continue</button></noscript>\n");
    page.push_str("</form>\n</body>\n</html>\n");
    page
}

fn escape_html(value: &str) -> String {
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

/// Renders a token (or error) response message as a JSON object.
///
/// Parameters are strings on the wire except `expires_in`, which clients
/// expect as a number.
#[must_use]
pub fn to_json(response: &Message) -> Value {
    let mut object = Map::with_capacity(response.len());
    for (key, value) in response.iter() {
        if key == params::EXPIRES_IN
            && let Ok(seconds) = value.parse::<i64>()
        {
            object.insert(key.to_owned(), Value::from(seconds));
            continue;
        }
        object.insert(key.to_owned(), Value::from(value));
    }
    Value::Object(object)
}

/// Collapses audiences per OIDC: one value serializes as a string, several
/// as an array, none as nothing.
#[must_use]
pub fn audience_value(audiences: &[String]) -> Option<Value> {
    match audiences {
        [] => None,
        [single] => Some(Value::from(single.as_str())),
        many => Some(Value::from(
            many.iter().map(|a| Value::from(a.as_str())).collect::<Vec<_>>(),
        )),
    }
}

/// Builds the userinfo claims object. Empty and null values are dropped;
/// `sub` is assumed present (the engine rejects before composing otherwise).
#[must_use]
pub fn userinfo_object(claims: &UserinfoClaims) -> Map<String, Value> {
    let mut object = Map::new();
    object.insert(claims::SUBJECT.to_owned(), Value::from(claims.subject.as_str()));

    if let Some(issuer) = claims.issuer.as_deref().filter(|iss| !iss.is_empty()) {
        object.insert(claims::ISSUER.to_owned(), Value::from(issuer));
    }

    if let Some(audience) = audience_value(&claims.audiences) {
        object.insert(claims::AUDIENCE.to_owned(), audience);
    }

    for (name, value) in &claims.claims {
        if value.is_null() {
            continue;
        }
        if let Some(text) = value.as_str()
            && text.is_empty()
        {
            continue;
        }
        object.insert(name.clone(), value.clone());
    }

    object
}
