//! Authentication tickets.
//!
//! A ticket bundles an authenticated identity (a set of named claims) with a
//! property bag and lifetime bounds. Tickets are created by the host's
//! authentication step or by a grant hook and flow through serialization and
//! response composition.
//!
//! # Ownership
//!
//! The engine never mutates a ticket it was handed. Every stage that needs a
//! changed ticket clones it first, so a stage running later (or a compensating
//! action) can never observe a mutated original.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use time::OffsetDateTime;

use crate::constants::{claims, properties};

/// A single typed claim about the authenticated subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    /// Claim name, e.g. `sub`, `email`, `given_name`.
    pub name: String,
    /// Claim value.
    pub value: String,
}

impl Claim {
    /// Creates a new claim.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// The authenticated subject: an ordered list of claims.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Claims describing the subject.
    pub claims: Vec<Claim>,
}

impl Identity {
    /// Creates an identity with a `sub` claim.
    #[must_use]
    pub fn with_subject(subject: impl Into<String>) -> Self {
        Self {
            claims: vec![Claim::new(claims::SUBJECT, subject)],
        }
    }

    /// Appends a claim.
    pub fn add_claim(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.claims.push(Claim::new(name, value));
    }

    /// Returns the first claim with the given name.
    #[must_use]
    pub fn get_claim(&self, name: &str) -> Option<&str> {
        self.claims
            .iter()
            .find(|claim| claim.name == name)
            .map(|claim| claim.value.as_str())
    }

    /// Returns the `sub` claim.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.get_claim(claims::SUBJECT)
    }
}

/// Declared usage of a serialized ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenUsage {
    /// An access token.
    AccessToken,
    /// An identity token.
    IdToken,
    /// A refresh token.
    RefreshToken,
    /// An authorization code.
    Code,
}

impl TokenUsage {
    /// Returns the wire representation of the usage.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AccessToken => "access_token",
            Self::IdToken => "id_token",
            Self::RefreshToken => "refresh_token",
            Self::Code => "code",
        }
    }

    /// Parses a usage from its wire representation.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "access_token" => Some(Self::AccessToken),
            "id_token" => Some(Self::IdToken),
            "refresh_token" => Some(Self::RefreshToken),
            "code" => Some(Self::Code),
            _ => None,
        }
    }
}

impl fmt::Display for TokenUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifetime bounds and the string property bag attached to a ticket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketProperties {
    /// Timestamp when the ticket was issued.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub issued_at: Option<OffsetDateTime>,

    /// Timestamp when the ticket expires.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub expires_at: Option<OffsetDateTime>,

    /// Free-form string properties (scopes, audiences, presenters, ...).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub items: BTreeMap<String, String>,
}

/// The bundle of authenticated identity and properties flowing between the
/// grant, serialization and response stages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    /// The authenticated subject.
    pub identity: Identity,
    /// Lifetime bounds and the property bag.
    pub properties: TicketProperties,
}

impl Ticket {
    /// Creates a ticket around an identity with empty properties.
    #[must_use]
    pub fn new(identity: Identity) -> Self {
        Self {
            identity,
            properties: TicketProperties::default(),
        }
    }

    /// Returns a property value.
    #[must_use]
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.items.get(key).map(String::as_str)
    }

    /// Sets a property value.
    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.properties.items.insert(key.into(), value.into());
    }

    fn list(&self, key: &str) -> Vec<&str> {
        self.property(key)
            .map(|value| value.split_ascii_whitespace().collect())
            .unwrap_or_default()
    }

    fn set_list<I, S>(&mut self, key: &str, values: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined = values
            .into_iter()
            .map(|value| value.as_ref().to_owned())
            .collect::<Vec<_>>()
            .join(" ");
        self.properties.items.insert(key.to_owned(), joined);
    }

    /// Returns the granted scopes.
    #[must_use]
    pub fn scopes(&self) -> Vec<&str> {
        self.list(properties::SCOPES)
    }

    /// Returns `true` if the ticket carries the given scope.
    #[must_use]
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes().contains(&scope)
    }

    /// Replaces the granted scopes.
    pub fn set_scopes<I, S>(&mut self, scopes: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.set_list(properties::SCOPES, scopes);
    }

    /// Returns the resource audiences.
    #[must_use]
    pub fn audiences(&self) -> Vec<&str> {
        self.list(properties::AUDIENCES)
    }

    /// Replaces the resource audiences.
    pub fn set_audiences<I, S>(&mut self, audiences: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.set_list(properties::AUDIENCES, audiences);
    }

    /// Returns the resources.
    #[must_use]
    pub fn resources(&self) -> Vec<&str> {
        self.list(properties::RESOURCES)
    }

    /// Replaces the resources.
    pub fn set_resources<I, S>(&mut self, resources: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.set_list(properties::RESOURCES, resources);
    }

    /// Returns the presenter (client) identifiers.
    #[must_use]
    pub fn presenters(&self) -> Vec<&str> {
        self.list(properties::PRESENTERS)
    }

    /// Replaces the presenter identifiers.
    pub fn set_presenters<I, S>(&mut self, presenters: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.set_list(properties::PRESENTERS, presenters);
    }

    /// Returns the stored nonce.
    #[must_use]
    pub fn nonce(&self) -> Option<&str> {
        self.property(properties::NONCE)
    }

    /// Returns the redirect URI the ticket was bound to.
    #[must_use]
    pub fn redirect_uri(&self) -> Option<&str> {
        self.property(properties::REDIRECT_URI)
    }

    /// Returns `true` if the ticket was marked confidential.
    #[must_use]
    pub fn is_confidential(&self) -> bool {
        self.property(properties::CONFIDENTIAL) == Some("true")
    }

    /// Marks or clears the confidentiality flag.
    pub fn set_confidential(&mut self, confidential: bool) {
        self.set_property(
            properties::CONFIDENTIAL,
            if confidential { "true" } else { "false" },
        );
    }

    /// Returns the declared usage of the ticket.
    #[must_use]
    pub fn usage(&self) -> Option<TokenUsage> {
        self.property(properties::USAGE).and_then(TokenUsage::parse)
    }

    /// Declares the usage of the ticket.
    pub fn set_usage(&mut self, usage: TokenUsage) {
        self.set_property(properties::USAGE, usage.as_str());
    }

    /// Returns `true` when the ticket carries an expiry in the past. A
    /// ticket without an expiry never expires.
    #[must_use]
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        match self.properties.expires_at {
            Some(expires_at) => expires_at < now,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    fn ticket() -> Ticket {
        Ticket::new(Identity::with_subject("user-1"))
    }

    #[test]
    fn test_identity_claims() {
        let mut identity = Identity::with_subject("user-1");
        identity.add_claim(claims::EMAIL, "user@example.com");

        assert_eq!(identity.subject(), Some("user-1"));
        assert_eq!(identity.get_claim(claims::EMAIL), Some("user@example.com"));
        assert_eq!(identity.get_claim(claims::PHONE_NUMBER), None);
    }

    #[test]
    fn test_duplicate_claim_returns_first() {
        let mut identity = Identity::default();
        identity.add_claim("role", "admin");
        identity.add_claim("role", "user");
        assert_eq!(identity.get_claim("role"), Some("admin"));
    }

    #[test]
    fn test_scope_round_trip() {
        let mut ticket = ticket();
        ticket.set_scopes(["openid", "profile"]);

        assert_eq!(ticket.scopes(), vec!["openid", "profile"]);
        assert!(ticket.has_scope("openid"));
        assert!(!ticket.has_scope("email"));
    }

    #[test]
    fn test_presenters_and_audiences() {
        let mut ticket = ticket();
        ticket.set_presenters(["client-1"]);
        ticket.set_audiences(["https://api.example.com", "https://other.example.com"]);

        assert_eq!(ticket.presenters(), vec!["client-1"]);
        assert_eq!(ticket.audiences().len(), 2);
    }

    #[test]
    fn test_usage() {
        let mut ticket = ticket();
        assert_eq!(ticket.usage(), None);

        ticket.set_usage(TokenUsage::RefreshToken);
        assert_eq!(ticket.usage(), Some(TokenUsage::RefreshToken));
        assert_eq!(ticket.property(properties::USAGE), Some("refresh_token"));
    }

    #[test]
    fn test_confidential_flag() {
        let mut ticket = ticket();
        assert!(!ticket.is_confidential());

        ticket.set_confidential(true);
        assert!(ticket.is_confidential());
    }

    #[test]
    fn test_expiry() {
        let now = OffsetDateTime::now_utc();

        let mut ticket = ticket();
        assert!(!ticket.is_expired_at(now));

        ticket.properties.expires_at = Some(now + Duration::minutes(5));
        assert!(!ticket.is_expired_at(now));

        ticket.properties.expires_at = Some(now - Duration::seconds(1));
        assert!(ticket.is_expired_at(now));
    }

    #[test]
    fn test_clone_leaves_original_untouched() {
        let mut original = ticket();
        original.set_scopes(["openid"]);

        let mut copy = original.clone();
        copy.set_scopes(["openid", "email"]);
        copy.properties.expires_at = Some(OffsetDateTime::now_utc());

        assert_eq!(original.scopes(), vec!["openid"]);
        assert!(original.properties.expires_at.is_none());
    }

    #[test]
    fn test_serde_round_trip() {
        let mut ticket = ticket();
        ticket.set_scopes(["openid"]);
        ticket.properties.issued_at = Some(OffsetDateTime::now_utc());

        let json = serde_json::to_string(&ticket).unwrap();
        let parsed: Ticket = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.identity.subject(), Some("user-1"));
        assert_eq!(parsed.scopes(), vec!["openid"]);
    }
}
