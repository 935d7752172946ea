//! The protocol engine.
//!
//! [`ServerEngine`] ties the pieces together: it rehydrates authorization
//! requests from the correlation store, runs the protocol validator, drives
//! the provider pipeline, dispatches token grants and hands composed
//! responses back to the transport layer.
//!
//! The engine is transport-agnostic: inbound requests arrive as [`Message`]
//! values and outbound responses are described by [`AuthorizationOutcome`]
//! and [`EndpointResponse`] for the host to render.

use serde_json::Value;
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::cache::{CorrelationStore, RequestCache};
use crate::config::ServerConfig;
use crate::constants::{params, scopes, token_types};
use crate::error::{EngineError, ProtocolError};
use crate::grants::{GrantType, TokenFlowState};
use crate::message::{Message, RequestKind};
use crate::pipeline::{
    DeserializeContext, GrantContext, HandleContext, SerializeContext, ServerProvider,
    UserinfoClaims, UserinfoContext, ValidationContext,
};
use crate::response::{self, ResponseMode};
use crate::ticket::{Ticket, TokenUsage};
use crate::validator;

/// Result of processing an authorization request.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthorizationOutcome {
    /// The request is valid but needs interactive sign-in. The host should
    /// send the user agent to its login experience, carrying `request_id`,
    /// and resume with [`ServerEngine::complete_authorization`].
    Pending {
        /// Correlation identifier for resuming the request.
        request_id: String,
    },
    /// Redirect the user agent to `location`.
    Redirect {
        /// Absolute redirect target, parameters already appended.
        location: String,
    },
    /// Deliver `html` as a `text/html` page (form_post mode).
    FormPost {
        /// Self-submitting form markup.
        html: String,
    },
    /// The request failed before a trustworthy redirect target was known;
    /// the host must render the error itself.
    Error(ProtocolError),
}

/// A JSON response from the token or userinfo endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointResponse {
    /// HTTP status code to send.
    pub status: u16,
    /// JSON body.
    pub body: Value,
}

impl EndpointResponse {
    fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }
}

fn error_status(error: &ProtocolError) -> u16 {
    if error.error == crate::error::ErrorCode::ServerError {
        500
    } else {
        // Never 401: a challenge would loop the client back through
        // authentication middleware.
        400
    }
}

fn apply_error(response: &mut Message, error: &ProtocolError) {
    response.set_parameter(params::ERROR, error.error.as_str());
    if let Some(description) = &error.error_description {
        response.set_parameter(params::ERROR_DESCRIPTION, description.clone());
    }
    if let Some(uri) = &error.error_uri {
        response.set_parameter(params::ERROR_URI, uri.clone());
    }
}

/// The OAuth2/OpenID Connect protocol engine.
pub struct ServerEngine {
    provider: Arc<dyn ServerProvider>,
    store: CorrelationStore,
    config: ServerConfig,
}

impl ServerEngine {
    /// Creates an engine around a provider, a request cache backend and a
    /// configuration.
    #[must_use]
    pub fn new(
        provider: Arc<dyn ServerProvider>,
        cache: Arc<dyn RequestCache>,
        config: ServerConfig,
    ) -> Self {
        let lifetime = time::Duration::try_from(config.request_cache_lifetime)
            .unwrap_or(time::Duration::HOUR);
        Self {
            provider,
            store: CorrelationStore::new(cache, lifetime),
            config,
        }
    }

    /// Processes an inbound authorization request.
    ///
    /// Runs validation and the provider's validate/handle hooks. When the
    /// handle hook supplies a ticket, the flow completes immediately;
    /// otherwise the request is cached and a [`AuthorizationOutcome::Pending`]
    /// asks the host to authenticate the user.
    pub async fn begin_authorization(
        &self,
        mut request: Message,
    ) -> Result<AuthorizationOutcome, EngineError> {
        if let Err(error) = self.rehydrate(&mut request).await? {
            return self.authorization_error(&request, error).await;
        }

        if let Err(error) = self.validate_authorization(&request).await? {
            return self.authorization_error(&request, error).await;
        }

        let mut handle = HandleContext::new(&request);
        self.provider
            .handle_authorization_request(&mut handle)
            .await?;

        if let Some(error) = handle.state.error() {
            let error = error.clone();
            return self.authorization_error(&request, error).await;
        }

        // A hook that supplied the full response bypasses composition.
        if let Some(response) = handle.response.take() {
            if let Some(id) = request.request_id() {
                self.store.discard(id).await;
            }
            return self.render_authorization(&request, &response);
        }

        if let Some(ticket) = handle.ticket.take() {
            return self.finish_authorization(&request, ticket).await;
        }

        // The request must survive the interactive detour. Reuse an
        // identifier the request already carries instead of caching twice.
        let request_id = match request.request_id() {
            Some(id) => id.to_owned(),
            None => self.store.save(&request).await?,
        };

        Ok(AuthorizationOutcome::Pending { request_id })
    }

    /// Resumes an authorization request after the host authenticated the
    /// user and accepted the grant.
    pub async fn complete_authorization(
        &self,
        mut request: Message,
        ticket: Ticket,
    ) -> Result<AuthorizationOutcome, EngineError> {
        if let Err(error) = self.rehydrate(&mut request).await? {
            return self.authorization_error(&request, error).await;
        }

        if let Err(error) = self.validate_authorization(&request).await? {
            return self.authorization_error(&request, error).await;
        }

        self.finish_authorization(&request, ticket).await
    }

    /// Resumes an authorization request the resource owner refused.
    pub async fn deny_authorization(
        &self,
        mut request: Message,
    ) -> Result<AuthorizationOutcome, EngineError> {
        if let Err(error) = self.rehydrate(&mut request).await? {
            return self.authorization_error(&request, error).await;
        }

        let error = ProtocolError::access_denied(
            "The authorization grant has been denied by the resource owner",
        );
        self.authorization_error(&request, error).await
    }

    /// Fills missing parameters from the correlation store when the request
    /// carries a `request_id`. A stale or unknown identifier rejects the
    /// request outright rather than proceeding with partial data.
    async fn rehydrate(
        &self,
        request: &mut Message,
    ) -> Result<Result<(), ProtocolError>, EngineError> {
        let Some(id) = request.request_id().map(str::to_owned) else {
            return Ok(Ok(()));
        };

        match self.store.restore(&id).await? {
            Some(parameters) => {
                request.fill_missing(parameters.iter().map(|(k, v)| (k.as_str(), v.as_str())));
                Ok(Ok(()))
            }
            None => {
                debug!(request_id = %id, "cached authorization request expired or missing");
                Ok(Err(ProtocolError::invalid_request(
                    "Invalid request: timeout expired",
                )))
            }
        }
    }

    /// Runs the shape checks and the provider's validate hook.
    async fn validate_authorization(
        &self,
        request: &Message,
    ) -> Result<Result<(), ProtocolError>, EngineError> {
        if let Err(error) = validator::validate_authorization_request(request, &self.config) {
            return Ok(Err(error));
        }

        let mut context = ValidationContext::new(request);
        self.provider
            .validate_authorization_request(&mut context)
            .await?;

        if let Some(error) = context.state.error() {
            return Ok(Err(error.clone()));
        }
        if !context.state.is_validated() {
            return Ok(Err(ProtocolError::invalid_request(
                "The authorization request was not validated by the server",
            )));
        }

        Ok(Ok(()))
    }

    /// Serializes the artifacts the negotiated response_type asks for and
    /// renders the response in the negotiated mode.
    async fn finish_authorization(
        &self,
        request: &Message,
        ticket: Ticket,
    ) -> Result<AuthorizationOutcome, EngineError> {
        let now = OffsetDateTime::now_utc();
        let mut response = Message::new(RequestKind::Response);

        if request.has_response_type(crate::constants::response_types::CODE) {
            let mut copy = self.mint(&ticket, TokenUsage::Code, now, request);
            if let Some(redirect_uri) = request.redirect_uri() {
                copy.set_property(crate::constants::properties::REDIRECT_URI, redirect_uri);
            }

            match self
                .serialize(request, &copy, TokenUsage::Code)
                .await?
            {
                Some(code) => response.set_parameter(params::CODE, code),
                None => {
                    return self
                        .authorization_error(request, missing_artifact(TokenUsage::Code))
                        .await;
                }
            }
        }

        if request.has_response_type(crate::constants::response_types::TOKEN) {
            let copy = self.mint(&ticket, TokenUsage::AccessToken, now, request);
            let expires_at = copy.properties.expires_at;

            match self
                .serialize(request, &copy, TokenUsage::AccessToken)
                .await?
            {
                Some(token) => {
                    response.set_parameter(params::ACCESS_TOKEN, token);
                    response.set_parameter(params::TOKEN_TYPE, token_types::BEARER);
                    if let Some(expires_at) = expires_at
                        && expires_at > now
                    {
                        response.set_parameter(
                            params::EXPIRES_IN,
                            response::expires_in(expires_at, now).to_string(),
                        );
                    }
                }
                None => {
                    return self
                        .authorization_error(request, missing_artifact(TokenUsage::AccessToken))
                        .await;
                }
            }
        }

        if request.has_response_type(crate::constants::response_types::ID_TOKEN) {
            let mut copy = self.mint(&ticket, TokenUsage::IdToken, now, request);
            if let Some(nonce) = request.nonce() {
                copy.set_property(crate::constants::properties::NONCE, nonce);
            }

            match self
                .serialize(request, &copy, TokenUsage::IdToken)
                .await?
            {
                Some(token) => response.set_parameter(params::ID_TOKEN, token),
                None => {
                    return self
                        .authorization_error(request, missing_artifact(TokenUsage::IdToken))
                        .await;
                }
            }
        }

        if let Some(state) = request.state() {
            response.set_parameter(params::STATE, state);
        }

        if let Some(id) = request.request_id() {
            self.store.discard(id).await;
        }

        self.provider
            .apply_authorization_response(request, &mut response)
            .await?;

        self.render_authorization(request, &response)
    }

    /// Reports an authorization failure, redirecting to the client when the
    /// redirect target can be trusted and surfacing the error directly
    /// otherwise.
    async fn authorization_error(
        &self,
        request: &Message,
        error: ProtocolError,
    ) -> Result<AuthorizationOutcome, EngineError> {
        debug!(error = %error.error, "authorization request rejected");

        if let Some(id) = request.request_id() {
            self.store.discard(id).await;
        }

        if !has_trusted_redirect(request) {
            return Ok(AuthorizationOutcome::Error(error));
        }

        let mut response = Message::new(RequestKind::Response);
        apply_error(&mut response, &error);
        if let Some(state) = request.state() {
            response.set_parameter(params::STATE, state);
        }

        self.provider
            .apply_authorization_response(request, &mut response)
            .await?;

        self.render_authorization(request, &response)
    }

    fn render_authorization(
        &self,
        request: &Message,
        response: &Message,
    ) -> Result<AuthorizationOutcome, EngineError> {
        let Some(redirect_uri) = request.redirect_uri() else {
            return Err(EngineError::internal(
                "authorization response rendered without a redirect_uri",
            ));
        };

        match ResponseMode::negotiate(request) {
            ResponseMode::FormPost => Ok(AuthorizationOutcome::FormPost {
                html: response::form_post_page(redirect_uri, response),
            }),
            mode => Ok(AuthorizationOutcome::Redirect {
                location: response::redirect_location(redirect_uri, response, mode)?,
            }),
        }
    }

    /// Processes a token request and composes the JSON response.
    pub async fn token(&self, request: Message) -> Result<EndpointResponse, EngineError> {
        let mut state = TokenFlowState::Received;
        debug!(state = state.name(), "token request received");

        let grant = match request.grant_type().and_then(GrantType::parse) {
            Some(grant) => grant,
            None => {
                return self
                    .token_error(
                        &request,
                        ProtocolError::unsupported_grant_type(
                            "The grant_type parameter is missing or unsupported",
                        ),
                    )
                    .await;
            }
        };

        let mut context = ValidationContext::new(&request);
        self.provider.validate_token_request(&mut context).await?;

        if let Some(error) = context.state.error() {
            let error = error.clone();
            return self.token_error(&request, error).await;
        }
        if !context.state.is_validated() {
            return self
                .token_error(
                    &request,
                    ProtocolError::invalid_request(
                        "The token request was not validated by the server",
                    ),
                )
                .await;
        }

        state = TokenFlowState::GrantSelected(grant.clone());
        debug!(state = state.name(), grant = %grant, "token request accepted");

        let ticket = match self.dispatch_grant(&request, &grant).await? {
            Ok(ticket) => ticket,
            Err(error) => return self.token_error(&request, error).await,
        };

        state = TokenFlowState::TicketObtained;
        debug!(state = state.name(), "grant produced a ticket");

        let mut handle = HandleContext::with_ticket(&request, ticket);
        self.provider.handle_token_request(&mut handle).await?;

        if let Some(error) = handle.state.error() {
            let error = error.clone();
            return self.token_error(&request, error).await;
        }
        if let Some(response) = handle.response.take() {
            debug!("token response supplied by the handle hook");
            return Ok(EndpointResponse::ok(response::to_json(&response)));
        }
        let Some(ticket) = handle.ticket.take() else {
            return self
                .token_error(
                    &request,
                    ProtocolError::server_error("The token request handler dropped the ticket"),
                )
                .await;
        };

        let response = match self.compose_token_response(&request, &ticket).await? {
            Ok(response) => response,
            Err(error) => return self.token_error(&request, error).await,
        };

        state = TokenFlowState::TokenComposed;
        debug!(state = state.name(), "token response composed");

        let mut response = response;
        self.provider
            .apply_token_response(&request, &mut response)
            .await?;

        state = TokenFlowState::Responded;
        debug!(state = state.name(), "token response delivered");

        Ok(EndpointResponse::ok(response::to_json(&response)))
    }

    /// Selects and runs the grant hook for `grant`, returning the resulting
    /// ticket or the protocol error terminating the flow.
    async fn dispatch_grant(
        &self,
        request: &Message,
        grant: &GrantType,
    ) -> Result<Result<Ticket, ProtocolError>, EngineError> {
        let mut context = match grant {
            GrantType::AuthorizationCode => {
                match self.redeem_artifact(request, TokenUsage::Code).await? {
                    Ok(ticket) => GrantContext::with_ticket(request, ticket),
                    Err(error) => return Ok(Err(error)),
                }
            }
            GrantType::RefreshToken => {
                match self.redeem_artifact(request, TokenUsage::RefreshToken).await? {
                    Ok(ticket) => GrantContext::with_ticket(request, ticket),
                    Err(error) => return Ok(Err(error)),
                }
            }
            _ => GrantContext::new(request),
        };

        match grant {
            GrantType::AuthorizationCode => {
                self.provider.grant_authorization_code(&mut context).await?;
            }
            GrantType::RefreshToken => {
                self.provider.grant_refresh_token(&mut context).await?;
            }
            GrantType::ClientCredentials => {
                self.provider.grant_client_credentials(&mut context).await?;
            }
            GrantType::Password => {
                self.provider
                    .grant_resource_owner_credentials(&mut context)
                    .await?;
            }
            GrantType::Custom(_) => {
                self.provider.grant_custom_extension(&mut context).await?;
            }
        }

        if let Some(error) = context.state.error() {
            return Ok(Err(error.clone()));
        }
        if !context.state.is_validated() {
            return Ok(Err(ProtocolError::unsupported_grant_type(format!(
                "The {grant} grant is not supported by the authorization server",
            ))));
        }

        match context.ticket.take() {
            Some(ticket) => Ok(Ok(ticket)),
            None => Ok(Err(ProtocolError::server_error(
                "The grant was validated without producing a ticket",
            ))),
        }
    }

    /// Deserializes and checks a presented authorization code or refresh
    /// token.
    async fn redeem_artifact(
        &self,
        request: &Message,
        usage: TokenUsage,
    ) -> Result<Result<Ticket, ProtocolError>, EngineError> {
        let (value, label) = match usage {
            TokenUsage::Code => (request.code(), "authorization code"),
            TokenUsage::RefreshToken => (request.refresh_token(), "refresh token"),
            _ => {
                return Err(EngineError::internal(
                    "only codes and refresh tokens are redeemed at the token endpoint",
                ));
            }
        };

        let Some(value) = value else {
            return Ok(Err(ProtocolError::invalid_request(format!(
                "The {label} is missing from the request",
            ))));
        };

        let mut context = DeserializeContext::new(request, value);
        match usage {
            TokenUsage::Code => {
                self.provider
                    .deserialize_authorization_code(&mut context)
                    .await?;
            }
            TokenUsage::RefreshToken => {
                self.provider.deserialize_refresh_token(&mut context).await?;
            }
            _ => {}
        }

        let Some(ticket) = context.ticket.take() else {
            return Ok(Err(ProtocolError::invalid_grant(format!(
                "Invalid {label}",
            ))));
        };

        if ticket.usage() != Some(usage) {
            return Ok(Err(ProtocolError::invalid_grant(format!(
                "The presented token is not a valid {label}",
            ))));
        }

        if ticket.is_expired_at(OffsetDateTime::now_utc()) {
            return Ok(Err(ProtocolError::invalid_grant(format!(
                "Expired {label}",
            ))));
        }

        // A code is bound to the redirect_uri it was issued for.
        if usage == TokenUsage::Code
            && let Some(bound) = ticket.redirect_uri()
            && request.redirect_uri() != Some(bound)
        {
            return Ok(Err(ProtocolError::invalid_grant(
                "The redirect_uri does not match the one used in the authorization request",
            )));
        }

        let presenters = ticket.presenters();
        if !presenters.is_empty() {
            match request.client_id() {
                Some(client_id) if presenters.contains(&client_id) => {}
                Some(_) => {
                    return Ok(Err(ProtocolError::invalid_grant(format!(
                        "The {label} was issued to another client",
                    ))));
                }
                None => {
                    return Ok(Err(ProtocolError::invalid_request(
                        "client_id was missing from the request",
                    )));
                }
            }
        }

        Ok(Ok(ticket))
    }

    /// Mints the access token (always), refresh token (on `offline_access`)
    /// and identity token (on `openid`) for a granted ticket.
    async fn compose_token_response(
        &self,
        request: &Message,
        ticket: &Ticket,
    ) -> Result<Result<Message, ProtocolError>, EngineError> {
        let now = OffsetDateTime::now_utc();
        let mut response = Message::new(RequestKind::Response);

        let access = self.mint(ticket, TokenUsage::AccessToken, now, request);
        let expires_at = access.properties.expires_at;
        let Some(token) = self
            .serialize(request, &access, TokenUsage::AccessToken)
            .await?
        else {
            return Ok(Err(missing_artifact(TokenUsage::AccessToken)));
        };
        response.set_parameter(params::ACCESS_TOKEN, token);
        response.set_parameter(params::TOKEN_TYPE, token_types::BEARER);
        if let Some(expires_at) = expires_at
            && expires_at > now
        {
            response.set_parameter(
                params::EXPIRES_IN,
                response::expires_in(expires_at, now).to_string(),
            );
        }

        if ticket.has_scope(scopes::OFFLINE_ACCESS) {
            let copy = self.mint(ticket, TokenUsage::RefreshToken, now, request);
            let Some(token) = self
                .serialize(request, &copy, TokenUsage::RefreshToken)
                .await?
            else {
                return Ok(Err(missing_artifact(TokenUsage::RefreshToken)));
            };
            response.set_parameter(params::REFRESH_TOKEN, token);
        }

        if ticket.has_scope(scopes::OPENID) {
            let copy = self.mint(ticket, TokenUsage::IdToken, now, request);
            let Some(token) = self
                .serialize(request, &copy, TokenUsage::IdToken)
                .await?
            else {
                return Ok(Err(missing_artifact(TokenUsage::IdToken)));
            };
            response.set_parameter(params::ID_TOKEN, token);
        }

        Ok(Ok(response))
    }

    /// Reports a token failure as a JSON error response, after the apply
    /// hook had its chance to adjust it.
    async fn token_error(
        &self,
        request: &Message,
        error: ProtocolError,
    ) -> Result<EndpointResponse, EngineError> {
        debug!(error = %error.error, "token request rejected");

        let mut response = Message::new(RequestKind::Response);
        apply_error(&mut response, &error);
        self.provider
            .apply_token_response(request, &mut response)
            .await?;

        Ok(EndpointResponse {
            status: error_status(&error),
            body: response::to_json(&response),
        })
    }

    /// Processes a userinfo request. `authorization` is the raw value of
    /// the `Authorization` header, if one was sent.
    pub async fn userinfo(
        &self,
        request: Message,
        authorization: Option<&str>,
    ) -> Result<EndpointResponse, EngineError> {
        let token = match validator::extract_access_token(authorization, &request) {
            Ok(token) => token,
            Err(error) => return self.userinfo_error(&request, error).await,
        };

        let mut context = ValidationContext::new(&request);
        self.provider
            .validate_userinfo_request(&mut context)
            .await?;

        if let Some(error) = context.state.error() {
            let error = error.clone();
            return self.userinfo_error(&request, error).await;
        }
        if !context.state.is_validated() {
            return self
                .userinfo_error(
                    &request,
                    ProtocolError::invalid_request(
                        "The userinfo request was not validated by the server",
                    ),
                )
                .await;
        }

        let mut deserialize = DeserializeContext::new(&request, &token);
        self.provider
            .deserialize_access_token(&mut deserialize)
            .await?;

        let Some(ticket) = deserialize.ticket.take() else {
            return self
                .userinfo_error(&request, ProtocolError::invalid_grant("Invalid token"))
                .await;
        };

        // A token without an expiry is never accepted here.
        let expired = ticket
            .properties
            .expires_at
            .is_none_or(|expires_at| expires_at < OffsetDateTime::now_utc());
        if expired {
            return self
                .userinfo_error(&request, ProtocolError::invalid_grant("Expired token"))
                .await;
        }

        let claims = match self.collect_userinfo_claims(&ticket) {
            Ok(claims) => claims,
            Err(error) => return self.userinfo_error(&request, error).await,
        };

        let mut context = UserinfoContext::new(&request, &ticket, claims);
        self.provider.handle_userinfo_request(&mut context).await?;

        if let Some(error) = context.state.error() {
            let error = error.clone();
            return self.userinfo_error(&request, error).await;
        }

        // A hook that supplied the full response bypasses composition.
        if let Some(object) = context.response.take() {
            debug!("userinfo response supplied by the handle hook");
            return Ok(EndpointResponse::ok(Value::Object(object)));
        }

        if context.claims.subject.is_empty() {
            return self
                .userinfo_error(
                    &request,
                    ProtocolError::server_error("The mandatory sub claim is missing"),
                )
                .await;
        }

        let mut object = response::userinfo_object(&context.claims);
        self.provider
            .apply_userinfo_response(&request, &mut object)
            .await?;

        Ok(EndpointResponse::ok(Value::Object(object)))
    }

    /// Pre-fills the standard claims the granted scopes allow.
    fn collect_userinfo_claims(&self, ticket: &Ticket) -> Result<UserinfoClaims, ProtocolError> {
        use crate::constants::claims;

        let Some(subject) = ticket.identity.subject() else {
            return Err(ProtocolError::server_error(
                "The access token does not identify a subject",
            ));
        };

        let mut result = UserinfoClaims {
            subject: subject.to_owned(),
            issuer: self.config.issuer.as_ref().map(|iss| iss.to_string()),
            // The clients the token was issued to are its audiences here.
            audiences: ticket
                .presenters()
                .iter()
                .map(|p| (*p).to_owned())
                .collect(),
            ..Default::default()
        };

        let mut copy_claim = |name: &str| {
            if let Some(value) = ticket.identity.get_claim(name) {
                result.claims.insert(name.to_owned(), Value::from(value));
            }
        };

        if ticket.has_scope(scopes::PROFILE) {
            copy_claim(claims::FAMILY_NAME);
            copy_claim(claims::GIVEN_NAME);
            copy_claim(claims::PREFERRED_USERNAME);
            copy_claim(claims::BIRTHDATE);
            copy_claim(claims::PROFILE);
            copy_claim(claims::WEBSITE);
        }
        if ticket.has_scope(scopes::EMAIL) {
            copy_claim(claims::EMAIL);
            copy_claim(claims::EMAIL_VERIFIED);
        }
        if ticket.has_scope(scopes::PHONE) {
            copy_claim(claims::PHONE_NUMBER);
            copy_claim(claims::PHONE_NUMBER_VERIFIED);
        }
        if ticket.has_scope(scopes::ADDRESS) {
            copy_claim(claims::ADDRESS);
        }

        Ok(result)
    }

    /// Reports a userinfo failure as a JSON error response, after the apply
    /// hook had its chance to adjust it.
    async fn userinfo_error(
        &self,
        request: &Message,
        error: ProtocolError,
    ) -> Result<EndpointResponse, EngineError> {
        debug!(error = %error.error, "userinfo request rejected");

        let mut object = serde_json::Map::new();
        object.insert(params::ERROR.to_owned(), Value::from(error.error.as_str()));
        if let Some(description) = &error.error_description {
            object.insert(
                params::ERROR_DESCRIPTION.to_owned(),
                Value::from(description.as_str()),
            );
        }
        if let Some(uri) = &error.error_uri {
            object.insert(params::ERROR_URI.to_owned(), Value::from(uri.as_str()));
        }

        self.provider
            .apply_userinfo_response(request, &mut object)
            .await?;

        Ok(EndpointResponse {
            status: error_status(&error),
            body: Value::Object(object),
        })
    }

    /// Clones the ticket for one artifact, stamping usage, issue time and a
    /// default expiry from configuration.
    fn mint(
        &self,
        ticket: &Ticket,
        usage: TokenUsage,
        now: OffsetDateTime,
        request: &Message,
    ) -> Ticket {
        let mut copy = ticket.clone();
        copy.set_usage(usage);
        copy.properties.issued_at = Some(now);

        let lifetime = match usage {
            TokenUsage::Code => self.config.authorization_code_lifetime,
            TokenUsage::AccessToken => self.config.access_token_lifetime,
            TokenUsage::IdToken => self.config.identity_token_lifetime,
            TokenUsage::RefreshToken => self.config.refresh_token_lifetime,
        };
        copy.properties.expires_at = time::Duration::try_from(lifetime)
            .ok()
            .map(|lifetime| now + lifetime);

        // Remember which client the artifact was issued to.
        if copy.presenters().is_empty()
            && let Some(client_id) = request.client_id()
        {
            copy.set_presenters([client_id]);
        }

        copy
    }

    async fn serialize(
        &self,
        request: &Message,
        ticket: &Ticket,
        usage: TokenUsage,
    ) -> Result<Option<String>, EngineError> {
        let mut context = SerializeContext::new(request, ticket);
        match usage {
            TokenUsage::Code => {
                self.provider
                    .serialize_authorization_code(&mut context)
                    .await?;
            }
            TokenUsage::AccessToken => {
                self.provider.serialize_access_token(&mut context).await?;
            }
            TokenUsage::IdToken => {
                self.provider.serialize_identity_token(&mut context).await?;
            }
            TokenUsage::RefreshToken => {
                self.provider.serialize_refresh_token(&mut context).await?;
            }
        }

        match context.artifact.take() {
            Some(artifact) if !artifact.is_empty() => Ok(Some(artifact)),
            _ => {
                warn!(usage = %usage, "serialization hook produced no artifact");
                Ok(None)
            }
        }
    }
}

fn missing_artifact(usage: TokenUsage) -> ProtocolError {
    ProtocolError::server_error(format!(
        "The {usage} serialization produced no artifact",
    ))
}

/// Whether the request carries a redirect target trustworthy enough to
/// deliver an error to: a client is identified and the URI is present,
/// absolute and fragment-free.
fn has_trusted_redirect(request: &Message) -> bool {
    request.client_id().is_some()
        && request
            .redirect_uri()
            .and_then(|uri| url::Url::parse(uri).ok())
            .is_some_and(|uri| uri.fragment().is_none())
}
