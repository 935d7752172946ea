//! Grant selection for the token endpoint.

use std::fmt;
use url::Url;

use crate::constants::grant_types;
use crate::error::ProtocolError;

/// The token-issuance path selected by the `grant_type` parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GrantType {
    /// Redeeming an authorization code.
    AuthorizationCode,
    /// Redeeming a refresh token.
    RefreshToken,
    /// Client-only authentication.
    ClientCredentials,
    /// Resource-owner password credentials.
    Password,
    /// An extension grant identified by an absolute URI.
    Custom(String),
}

impl GrantType {
    /// Parses a `grant_type` value. Extension grants must be identified by
    /// an absolute URI; anything else is unrecognized.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            grant_types::AUTHORIZATION_CODE => Some(Self::AuthorizationCode),
            grant_types::REFRESH_TOKEN => Some(Self::RefreshToken),
            grant_types::CLIENT_CREDENTIALS => Some(Self::ClientCredentials),
            grant_types::PASSWORD => Some(Self::Password),
            other => Url::parse(other)
                .is_ok()
                .then(|| Self::Custom(other.to_owned())),
        }
    }
}

impl fmt::Display for GrantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AuthorizationCode => f.write_str(grant_types::AUTHORIZATION_CODE),
            Self::RefreshToken => f.write_str(grant_types::REFRESH_TOKEN),
            Self::ClientCredentials => f.write_str(grant_types::CLIENT_CREDENTIALS),
            Self::Password => f.write_str(grant_types::PASSWORD),
            Self::Custom(uri) => f.write_str(uri),
        }
    }
}

/// Progress of a token request through the endpoint.
///
/// `Rejected` is terminal and reachable from every other state.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenFlowState {
    /// The request has been parsed.
    Received,
    /// A grant path has been selected from `grant_type`.
    GrantSelected(GrantType),
    /// The grant stage produced a ticket.
    TicketObtained,
    /// All artifacts have been serialized into a response.
    TokenComposed,
    /// The response has been handed back to the transport.
    Responded,
    /// The request was refused.
    Rejected(ProtocolError),
}

impl TokenFlowState {
    /// Short name for logging.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::GrantSelected(_) => "grant_selected",
            Self::TicketObtained => "ticket_obtained",
            Self::TokenComposed => "token_composed",
            Self::Responded => "responded",
            Self::Rejected(_) => "rejected",
        }
    }

    /// Returns `true` for the terminal rejection state.
    #[must_use]
    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }
}
