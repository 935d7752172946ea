//! Canonical protocol message representation.
//!
//! Every inbound request and outbound response is an ordered mapping from
//! parameter name to value plus a discriminator saying which endpoint the
//! message belongs to. Parameter names are case-sensitive and unique; once a
//! message has been constructed its parsing rules (HTTP method and content
//! type) have already been satisfied.
//!
//! # Construction
//!
//! Messages are built from a query string (GET) or a URL-encoded form body
//! (POST). Any other method, or a POST without an
//! `application/x-www-form-urlencoded` content type, is rejected before a
//! message exists at all.

use indexmap::IndexMap;

use crate::constants::{content_types, params, response_modes, response_types};
use crate::error::ProtocolError;

/// Discriminator for the endpoint a message belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    /// An authorization endpoint request.
    Authorization,
    /// A token endpoint request.
    Token,
    /// A userinfo endpoint request.
    Userinfo,
    /// An outbound response message.
    Response,
}

/// An ordered protocol parameter map.
///
/// Duplicate parameters encountered while parsing keep the first value;
/// replacing a value requires an explicit [`Message::set_parameter`] call.
#[derive(Debug, Clone)]
pub struct Message {
    kind: RequestKind,
    parameters: IndexMap<String, String>,
}

impl Message {
    /// Creates an empty message.
    #[must_use]
    pub fn new(kind: RequestKind) -> Self {
        Self {
            kind,
            parameters: IndexMap::new(),
        }
    }

    /// Parses a message from a URL query string.
    #[must_use]
    pub fn from_query(kind: RequestKind, query: &str) -> Self {
        Self::from_encoded(kind, query)
    }

    /// Parses a message from a URL-encoded form body.
    #[must_use]
    pub fn from_form(kind: RequestKind, body: &str) -> Self {
        Self::from_encoded(kind, body)
    }

    /// Builds a message from a normalized HTTP request.
    ///
    /// GET requests are read from the query string and POST requests from the
    /// form body. Any other method is rejected, as is a POST whose
    /// `Content-Type` is not `application/x-www-form-urlencoded` (a
    /// `; charset=` suffix is permitted).
    ///
    /// # Errors
    ///
    /// Returns an `invalid_request` payload describing the malformed request.
    pub fn from_http(
        kind: RequestKind,
        method: &str,
        content_type: Option<&str>,
        query: &str,
        body: &str,
    ) -> Result<Self, ProtocolError> {
        if method.eq_ignore_ascii_case("GET") {
            return Ok(Self::from_query(kind, query));
        }

        if method.eq_ignore_ascii_case("POST") {
            let Some(content_type) = content_type.filter(|value| !value.trim().is_empty()) else {
                return Err(ProtocolError::invalid_request(
                    "A malformed request has been received: the mandatory 'Content-Type' \
                     header was missing from the POST request.",
                ));
            };

            // May carry a media type suffix such as "; charset=utf-8".
            if !content_type
                .to_ascii_lowercase()
                .starts_with(content_types::FORM_URLENCODED)
            {
                return Err(ProtocolError::invalid_request(
                    "A malformed request has been received: the 'Content-Type' header \
                     contained an unexpected value. Make sure to use \
                     'application/x-www-form-urlencoded'.",
                ));
            }

            return Ok(Self::from_form(kind, body));
        }

        Err(ProtocolError::invalid_request(
            "A malformed request has been received: make sure to use either GET or POST.",
        ))
    }

    fn from_encoded(kind: RequestKind, input: &str) -> Self {
        let mut message = Self::new(kind);
        for (name, value) in url::form_urlencoded::parse(input.as_bytes()) {
            if name.is_empty() {
                continue;
            }
            // First occurrence wins; a later duplicate never overwrites.
            message
                .parameters
                .entry(name.into_owned())
                .or_insert_with(|| value.into_owned());
        }
        message
    }

    /// Returns the endpoint discriminator.
    #[must_use]
    pub fn kind(&self) -> RequestKind {
        self.kind
    }

    /// Returns the value of a parameter, if present.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).map(String::as_str)
    }

    /// Returns the value of a parameter when it is present and non-empty.
    #[must_use]
    pub fn get_non_empty(&self, name: &str) -> Option<&str> {
        self.get(name).filter(|value| !value.is_empty())
    }

    /// Returns `true` if the parameter is present (possibly empty).
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.parameters.contains_key(name)
    }

    /// Sets or replaces a parameter. The only sanctioned way to overwrite.
    pub fn set_parameter(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.parameters.insert(name.into(), value.into());
    }

    /// Removes a parameter, returning its previous value.
    pub fn remove_parameter(&mut self, name: &str) -> Option<String> {
        self.parameters.shift_remove(name)
    }

    /// Copies parameters from `defaults` that are absent from this message.
    ///
    /// Used when rehydrating a request from the correlation cache: live
    /// query/form parameters always take precedence over cached ones.
    pub fn fill_missing<'a>(&mut self, defaults: impl IntoIterator<Item = (&'a str, &'a str)>) {
        for (name, value) in defaults {
            if !self.parameters.contains_key(name) {
                self.parameters.insert(name.to_owned(), value.to_owned());
            }
        }
    }

    /// Iterates over the parameters in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.parameters
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    /// Returns the number of parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    /// Returns `true` when the message carries no parameters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    // ------------------------------------------------------------------
    // Typed accessors
    // ------------------------------------------------------------------

    /// The `client_id` parameter.
    #[must_use]
    pub fn client_id(&self) -> Option<&str> {
        self.get_non_empty(params::CLIENT_ID)
    }

    /// The `redirect_uri` parameter.
    #[must_use]
    pub fn redirect_uri(&self) -> Option<&str> {
        self.get_non_empty(params::REDIRECT_URI)
    }

    /// The `response_type` parameter.
    #[must_use]
    pub fn response_type(&self) -> Option<&str> {
        self.get_non_empty(params::RESPONSE_TYPE)
    }

    /// The `response_mode` parameter.
    #[must_use]
    pub fn response_mode(&self) -> Option<&str> {
        self.get_non_empty(params::RESPONSE_MODE)
    }

    /// The `scope` parameter.
    #[must_use]
    pub fn scope(&self) -> Option<&str> {
        self.get_non_empty(params::SCOPE)
    }

    /// The `state` parameter.
    #[must_use]
    pub fn state(&self) -> Option<&str> {
        self.get_non_empty(params::STATE)
    }

    /// The `nonce` parameter.
    #[must_use]
    pub fn nonce(&self) -> Option<&str> {
        self.get_non_empty(params::NONCE)
    }

    /// The `grant_type` parameter.
    #[must_use]
    pub fn grant_type(&self) -> Option<&str> {
        self.get_non_empty(params::GRANT_TYPE)
    }

    /// The `code` parameter.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.get_non_empty(params::CODE)
    }

    /// The `refresh_token` parameter.
    #[must_use]
    pub fn refresh_token(&self) -> Option<&str> {
        self.get_non_empty(params::REFRESH_TOKEN)
    }

    /// The `resource` parameter.
    #[must_use]
    pub fn resource(&self) -> Option<&str> {
        self.get_non_empty(params::RESOURCE)
    }

    /// The `access_token` parameter.
    #[must_use]
    pub fn access_token(&self) -> Option<&str> {
        self.get_non_empty(params::ACCESS_TOKEN)
    }

    /// The `request_id` correlation identifier.
    #[must_use]
    pub fn request_id(&self) -> Option<&str> {
        self.get_non_empty(params::REQUEST_ID)
    }

    // ------------------------------------------------------------------
    // Space-delimited list helpers
    // ------------------------------------------------------------------

    /// Returns `true` if the space-delimited `scope` parameter contains the
    /// given token.
    #[must_use]
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scope()
            .is_some_and(|value| value.split_ascii_whitespace().any(|token| token == scope))
    }

    /// Returns `true` if the space-delimited `response_type` parameter
    /// contains the given token. Token order is irrelevant.
    #[must_use]
    pub fn has_response_type(&self, response_type: &str) -> bool {
        self.response_type().is_some_and(|value| {
            value
                .split_ascii_whitespace()
                .any(|token| token == response_type)
        })
    }

    // ------------------------------------------------------------------
    // Flow-shape predicates
    // ------------------------------------------------------------------

    /// Returns `true` for `response_type=none` requests.
    #[must_use]
    pub fn is_none_flow(&self) -> bool {
        self.response_type_tokens()
            .is_some_and(|(count, none, code, token, id_token)| {
                none && count == 1 && !code && !token && !id_token
            })
    }

    /// Returns `true` for `response_type=code` requests.
    #[must_use]
    pub fn is_authorization_code_flow(&self) -> bool {
        self.response_type_tokens()
            .is_some_and(|(count, none, code, token, id_token)| {
                code && count == 1 && !none && !token && !id_token
            })
    }

    /// Returns `true` for implicit-flow requests (`token`, `id_token`, or
    /// `id_token token`, in any order).
    #[must_use]
    pub fn is_implicit_flow(&self) -> bool {
        self.response_type_tokens()
            .is_some_and(|(count, none, code, token, id_token)| {
                !code && !none
                    && (token || id_token)
                    && count == usize::from(token) + usize::from(id_token)
            })
    }

    /// Returns `true` for hybrid-flow requests (`code` combined with `token`
    /// and/or `id_token`, in any order).
    #[must_use]
    pub fn is_hybrid_flow(&self) -> bool {
        self.response_type_tokens()
            .is_some_and(|(count, none, code, token, id_token)| {
                code && !none
                    && (token || id_token)
                    && count == 1 + usize::from(token) + usize::from(id_token)
            })
    }

    /// Tallies the recognized `response_type` tokens.
    ///
    /// Returns `(total count, none, code, token, id_token)`. The total count
    /// includes unrecognized tokens so stray values poison every flow
    /// predicate.
    fn response_type_tokens(&self) -> Option<(usize, bool, bool, bool, bool)> {
        let value = self.response_type()?;
        let (mut count, mut none, mut code, mut token, mut id_token) =
            (0usize, false, false, false, false);
        for part in value.split_ascii_whitespace() {
            count += 1;
            match part {
                response_types::NONE => none = true,
                response_types::CODE => code = true,
                response_types::TOKEN => token = true,
                response_types::ID_TOKEN => id_token = true,
                _ => {}
            }
        }
        Some((count, none, code, token, id_token))
    }

    // ------------------------------------------------------------------
    // Response-mode predicates
    // ------------------------------------------------------------------

    /// Returns `true` when the response should be delivered in the query
    /// string: `response_mode=query`, or no `response_mode` on a code-only or
    /// none flow.
    #[must_use]
    pub fn is_query_response_mode(&self) -> bool {
        match self.response_mode() {
            Some(mode) => mode == response_modes::QUERY,
            None => self.is_authorization_code_flow() || self.is_none_flow(),
        }
    }

    /// Returns `true` when the response should be delivered in the URL
    /// fragment: `response_mode=fragment`, or no `response_mode` on an
    /// implicit or hybrid flow.
    #[must_use]
    pub fn is_fragment_response_mode(&self) -> bool {
        match self.response_mode() {
            Some(mode) => mode == response_modes::FRAGMENT,
            None => self.is_implicit_flow() || self.is_hybrid_flow(),
        }
    }

    /// Returns `true` when the response should be delivered as an
    /// auto-submitting HTML form.
    #[must_use]
    pub fn is_form_post_response_mode(&self) -> bool {
        self.response_mode() == Some(response_modes::FORM_POST)
    }
}
