//! Provider pipeline.
//!
//! The engine owns the protocol mechanics; everything application-specific
//! flows through a single [`ServerProvider`] implementation supplied by the
//! host. Every hook has a default no-op body, so a provider only overrides
//! the stages it cares about.
//!
//! Hooks communicate decisions through small mutable context records rather
//! than return values: a validation hook flips its context to validated or
//! rejected, a grant hook attaches a ticket, a serialization hook fills in
//! the artifact string.

use async_trait::async_trait;
use indexmap::IndexMap;

use crate::error::{EngineError, ProtocolError};
use crate::message::Message;
use crate::ticket::Ticket;

/// Tri-state outcome of a validation or grant stage.
///
/// The state starts unvalidated. `Rejected` is terminal: once a stage has
/// rejected, later `validate` calls are ignored and the first error is the
/// one reported.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ValidationState {
    /// No decision has been made yet.
    #[default]
    Unvalidated,
    /// The stage accepted the request.
    Validated,
    /// The stage rejected the request. Terminal.
    Rejected(ProtocolError),
}

impl ValidationState {
    /// Marks the state validated unless it was already rejected.
    pub fn validate(&mut self) {
        if !matches!(self, Self::Rejected(_)) {
            *self = Self::Validated;
        }
    }

    /// Rejects with the given error. The first rejection wins; later calls
    /// are ignored.
    pub fn reject(&mut self, error: ProtocolError) {
        if !matches!(self, Self::Rejected(_)) {
            *self = Self::Rejected(error);
        }
    }

    /// Returns `true` if the state is validated.
    #[must_use]
    pub fn is_validated(&self) -> bool {
        matches!(self, Self::Validated)
    }

    /// Returns `true` if the state is rejected.
    #[must_use]
    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }

    /// Returns the rejection error, if any.
    #[must_use]
    pub fn error(&self) -> Option<&ProtocolError> {
        match self {
            Self::Rejected(error) => Some(error),
            _ => None,
        }
    }
}

/// Context for the `validate_*_request` hooks.
#[derive(Debug)]
pub struct ValidationContext<'a> {
    /// The incoming request.
    pub request: &'a Message,
    /// The decision recorded by the hook.
    pub state: ValidationState,
}

impl<'a> ValidationContext<'a> {
    /// Creates an unvalidated context for `request`.
    #[must_use]
    pub fn new(request: &'a Message) -> Self {
        Self {
            request,
            state: ValidationState::Unvalidated,
        }
    }

    /// Accepts the request.
    pub fn validate(&mut self) {
        self.state.validate();
    }

    /// Rejects the request. Terminal; the first error wins.
    pub fn reject(&mut self, error: ProtocolError) {
        self.state.reject(error);
    }
}

/// Context for the `grant_*` hooks.
///
/// For `authorization_code` and `refresh_token` the engine deserializes the
/// presented artifact first and the context starts with that ticket already
/// attached; the hook may accept it, replace it or reject. For the
/// credential grants the context starts empty and the hook must attach a
/// ticket to accept.
#[derive(Debug)]
pub struct GrantContext<'a> {
    /// The token request.
    pub request: &'a Message,
    /// The ticket the grant resolves to.
    pub ticket: Option<Ticket>,
    /// The decision recorded by the hook.
    pub state: ValidationState,
}

impl<'a> GrantContext<'a> {
    /// Creates a context with no ticket attached.
    #[must_use]
    pub fn new(request: &'a Message) -> Self {
        Self {
            request,
            ticket: None,
            state: ValidationState::Unvalidated,
        }
    }

    /// Creates a context around a ticket the engine already resolved.
    #[must_use]
    pub fn with_ticket(request: &'a Message, ticket: Ticket) -> Self {
        Self {
            request,
            ticket: Some(ticket),
            state: ValidationState::Unvalidated,
        }
    }

    /// Accepts the grant with the ticket already attached.
    pub fn validate(&mut self) {
        self.state.validate();
    }

    /// Attaches `ticket` and accepts the grant.
    pub fn validate_with_ticket(&mut self, ticket: Ticket) {
        if !self.state.is_rejected() {
            self.ticket = Some(ticket);
            self.state.validate();
        }
    }

    /// Rejects the grant. Terminal; the first error wins.
    pub fn reject(&mut self, error: ProtocolError) {
        self.state.reject(error);
    }
}

/// Context for the `handle_authorization_request` and `handle_token_request`
/// hooks.
///
/// At the authorization endpoint the hook may attach a ticket to complete
/// the flow immediately; leaving the context untouched defers to the host's
/// interactive sign-in. At the token endpoint the context carries the ticket
/// produced by the grant stage, which the hook may adjust or reject.
///
/// Either hook may instead supply a complete response with [`handle`], in
/// which case the engine delivers it as-is and skips its own composition.
///
/// [`handle`]: HandleContext::handle
#[derive(Debug)]
pub struct HandleContext<'a> {
    /// The incoming request.
    pub request: &'a Message,
    /// The ticket completing the request, if any.
    pub ticket: Option<Ticket>,
    /// A complete response supplied by the hook, bypassing composition.
    pub response: Option<Message>,
    /// The decision recorded by the hook.
    pub state: ValidationState,
}

impl<'a> HandleContext<'a> {
    /// Creates a context with no ticket attached.
    #[must_use]
    pub fn new(request: &'a Message) -> Self {
        Self {
            request,
            ticket: None,
            response: None,
            state: ValidationState::Unvalidated,
        }
    }

    /// Creates a context around an existing ticket.
    #[must_use]
    pub fn with_ticket(request: &'a Message, ticket: Ticket) -> Self {
        Self {
            request,
            ticket: Some(ticket),
            response: None,
            state: ValidationState::Unvalidated,
        }
    }

    /// Supplies the full response, causing the engine to deliver it without
    /// serializing, composing or applying anything of its own.
    pub fn handle(&mut self, response: Message) {
        self.response = Some(response);
    }

    /// Returns `true` when the hook took over the response.
    #[must_use]
    pub fn is_handled(&self) -> bool {
        self.response.is_some()
    }

    /// Rejects the request. Terminal; the first error wins.
    pub fn reject(&mut self, error: ProtocolError) {
        self.state.reject(error);
    }
}

/// Context for the `serialize_*` hooks.
///
/// The hook turns the ticket into its wire artifact (an opaque code, a
/// bearer token, a signed identity token). An absent artifact after the
/// hook ran is treated as a server error by the engine.
#[derive(Debug)]
pub struct SerializeContext<'a> {
    /// The request being answered.
    pub request: &'a Message,
    /// The ticket to serialize.
    pub ticket: &'a Ticket,
    /// The serialized artifact produced by the hook.
    pub artifact: Option<String>,
}

impl<'a> SerializeContext<'a> {
    /// Creates a context for serializing `ticket`.
    #[must_use]
    pub fn new(request: &'a Message, ticket: &'a Ticket) -> Self {
        Self {
            request,
            ticket,
            artifact: None,
        }
    }
}

/// Context for the `deserialize_*` hooks.
///
/// The hook decodes a presented artifact back into the ticket it was
/// serialized from. Leaving `ticket` empty signals an invalid or unknown
/// artifact.
#[derive(Debug)]
pub struct DeserializeContext<'a> {
    /// The request presenting the artifact.
    pub request: &'a Message,
    /// The artifact to decode.
    pub value: &'a str,
    /// The decoded ticket, if the artifact was recognized.
    pub ticket: Option<Ticket>,
}

impl<'a> DeserializeContext<'a> {
    /// Creates a context for decoding `value`.
    #[must_use]
    pub fn new(request: &'a Message, value: &'a str) -> Self {
        Self {
            request,
            value,
            ticket: None,
        }
    }
}

/// Claims returned from the userinfo endpoint.
///
/// The engine fills `subject`, `audiences` and the scope-gated standard
/// claims; the `handle_userinfo_request` hook may add to or override the
/// extra claim map.
#[derive(Debug, Clone, Default)]
pub struct UserinfoClaims {
    /// Mandatory `sub` claim.
    pub subject: String,
    /// Optional `iss` claim.
    pub issuer: Option<String>,
    /// `aud` claim values. One value serializes as a string, several as an
    /// array.
    pub audiences: Vec<String>,
    /// Additional claims, serialized at the top level of the response.
    pub claims: IndexMap<String, serde_json::Value>,
}

impl UserinfoClaims {
    /// Sets an additional claim.
    pub fn set_claim(&mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.claims.insert(name.into(), value.into());
    }
}

/// Context for the `handle_userinfo_request` hook.
///
/// The hook normally adjusts `claims` and lets the engine compose the
/// response; [`handle`] instead supplies the full response object, which the
/// engine delivers as-is.
///
/// [`handle`]: UserinfoContext::handle
#[derive(Debug)]
pub struct UserinfoContext<'a> {
    /// The userinfo request.
    pub request: &'a Message,
    /// The ticket behind the presented access token.
    pub ticket: &'a Ticket,
    /// The claims to return, pre-filled by the engine.
    pub claims: UserinfoClaims,
    /// A complete response object supplied by the hook, bypassing
    /// composition.
    pub response: Option<serde_json::Map<String, serde_json::Value>>,
    /// The decision recorded by the hook.
    pub state: ValidationState,
}

impl<'a> UserinfoContext<'a> {
    /// Creates a context around the engine's pre-filled claims.
    #[must_use]
    pub fn new(request: &'a Message, ticket: &'a Ticket, claims: UserinfoClaims) -> Self {
        Self {
            request,
            ticket,
            claims,
            response: None,
            state: ValidationState::Unvalidated,
        }
    }

    /// Supplies the full response object, causing the engine to deliver it
    /// without its own claim composition or apply stage.
    pub fn handle(&mut self, response: serde_json::Map<String, serde_json::Value>) {
        self.response = Some(response);
    }

    /// Rejects the request. Terminal; the first error wins.
    pub fn reject(&mut self, error: ProtocolError) {
        self.state.reject(error);
    }
}

/// The host's integration surface.
///
/// Every method has a default no-op body. Hooks run after the engine's own
/// protocol checks, so a hook observing a request can rely on it being
/// well-formed.
#[async_trait]
pub trait ServerProvider: Send + Sync {
    /// Inspects a validated authorization request. Reject here to apply
    /// application policy (unknown client, forbidden redirect URI).
    async fn validate_authorization_request(
        &self,
        _context: &mut ValidationContext<'_>,
    ) -> Result<(), EngineError> {
        Ok(())
    }

    /// Inspects a token request before the grant is dispatched.
    async fn validate_token_request(
        &self,
        _context: &mut ValidationContext<'_>,
    ) -> Result<(), EngineError> {
        Ok(())
    }

    /// Inspects a userinfo request before the access token is decoded.
    async fn validate_userinfo_request(
        &self,
        _context: &mut ValidationContext<'_>,
    ) -> Result<(), EngineError> {
        Ok(())
    }

    /// Runs after a successful authorization validation. Attach a ticket to
    /// complete the flow without interactive sign-in, or supply a full
    /// response to take over composition entirely.
    async fn handle_authorization_request(
        &self,
        _context: &mut HandleContext<'_>,
    ) -> Result<(), EngineError> {
        Ok(())
    }

    /// Runs with the ticket produced by the grant stage, before artifacts
    /// are serialized. Supplying a full response skips token composition.
    async fn handle_token_request(
        &self,
        _context: &mut HandleContext<'_>,
    ) -> Result<(), EngineError> {
        Ok(())
    }

    /// Runs with the pre-filled userinfo claims, before the response is
    /// composed.
    async fn handle_userinfo_request(
        &self,
        _context: &mut UserinfoContext<'_>,
    ) -> Result<(), EngineError> {
        Ok(())
    }

    /// Decides the `authorization_code` grant. The context carries the
    /// ticket decoded from the presented code; call `validate` to accept it.
    async fn grant_authorization_code(
        &self,
        _context: &mut GrantContext<'_>,
    ) -> Result<(), EngineError> {
        Ok(())
    }

    /// Decides the `refresh_token` grant. The context carries the ticket
    /// decoded from the presented refresh token.
    async fn grant_refresh_token(
        &self,
        _context: &mut GrantContext<'_>,
    ) -> Result<(), EngineError> {
        Ok(())
    }

    /// Decides the `client_credentials` grant. Attach a ticket to accept.
    async fn grant_client_credentials(
        &self,
        _context: &mut GrantContext<'_>,
    ) -> Result<(), EngineError> {
        Ok(())
    }

    /// Decides the `password` grant. Attach a ticket to accept.
    async fn grant_resource_owner_credentials(
        &self,
        _context: &mut GrantContext<'_>,
    ) -> Result<(), EngineError> {
        Ok(())
    }

    /// Decides an extension grant identified by an absolute-URI grant type.
    /// Attach a ticket to accept; an untouched context yields
    /// `unsupported_grant_type`.
    async fn grant_custom_extension(
        &self,
        _context: &mut GrantContext<'_>,
    ) -> Result<(), EngineError> {
        Ok(())
    }

    /// Serializes a ticket into an authorization code.
    async fn serialize_authorization_code(
        &self,
        _context: &mut SerializeContext<'_>,
    ) -> Result<(), EngineError> {
        Ok(())
    }

    /// Serializes a ticket into an access token.
    async fn serialize_access_token(
        &self,
        _context: &mut SerializeContext<'_>,
    ) -> Result<(), EngineError> {
        Ok(())
    }

    /// Serializes a ticket into an identity token.
    async fn serialize_identity_token(
        &self,
        _context: &mut SerializeContext<'_>,
    ) -> Result<(), EngineError> {
        Ok(())
    }

    /// Serializes a ticket into a refresh token.
    async fn serialize_refresh_token(
        &self,
        _context: &mut SerializeContext<'_>,
    ) -> Result<(), EngineError> {
        Ok(())
    }

    /// Decodes an authorization code back into its ticket.
    async fn deserialize_authorization_code(
        &self,
        _context: &mut DeserializeContext<'_>,
    ) -> Result<(), EngineError> {
        Ok(())
    }

    /// Decodes an access token back into its ticket.
    async fn deserialize_access_token(
        &self,
        _context: &mut DeserializeContext<'_>,
    ) -> Result<(), EngineError> {
        Ok(())
    }

    /// Decodes an identity token back into its ticket.
    async fn deserialize_identity_token(
        &self,
        _context: &mut DeserializeContext<'_>,
    ) -> Result<(), EngineError> {
        Ok(())
    }

    /// Decodes a refresh token back into its ticket.
    async fn deserialize_refresh_token(
        &self,
        _context: &mut DeserializeContext<'_>,
    ) -> Result<(), EngineError> {
        Ok(())
    }

    /// Last-chance mutation of an authorization response before it is
    /// rendered.
    async fn apply_authorization_response(
        &self,
        _request: &Message,
        _response: &mut Message,
    ) -> Result<(), EngineError> {
        Ok(())
    }

    /// Last-chance mutation of a token response before it is rendered.
    async fn apply_token_response(
        &self,
        _request: &Message,
        _response: &mut Message,
    ) -> Result<(), EngineError> {
        Ok(())
    }

    /// Last-chance mutation of the userinfo claims object before it is
    /// rendered.
    async fn apply_userinfo_response(
        &self,
        _request: &Message,
        _response: &mut serde_json::Map<String, serde_json::Value>,
    ) -> Result<(), EngineError> {
        Ok(())
    }
}

/// Provider that accepts nothing and overrides nothing. Useful as a
/// placeholder and in tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProvider;

#[async_trait]
impl ServerProvider for NoopProvider {}
