//! # oidc-core
//!
//! An OAuth 2.0 / OpenID Connect authorization-server protocol engine.
//!
//! This crate provides:
//! - A wire-faithful message model for authorization, token and userinfo
//!   requests
//! - A correlation store keeping authorization requests alive across the
//!   interactive sign-in detour
//! - Ordered protocol-shape validation for the authorization endpoint
//! - A provider pipeline through which hosts plug in their business policy
//!   and token formats
//! - A grant dispatcher and response composer for the token and userinfo
//!   endpoints
//!
//! ## Overview
//!
//! The engine handles the protocol mechanics and deliberately nothing else:
//! client registration, credential checks and the cryptographic sealing of
//! tokens all live behind the [`ServerProvider`] trait the host implements.
//! Transports are equally out of scope; requests arrive as [`Message`]
//! values and responses leave as plain descriptions the host renders.
//!
//! ## Modules
//!
//! - [`message`] - Request/response parameter model and typed accessors
//! - [`cache`] - Correlation store and its storage trait
//! - [`validator`] - Pure protocol-shape checks
//! - [`pipeline`] - The provider trait and its hook contexts
//! - [`grants`] - Grant selection and the token-endpoint state machine
//! - [`response`] - Redirect, form-post and JSON response composition
//! - [`server`] - The engine tying the stages together
//! - [`ticket`] - Authentication tickets
//! - [`config`] - Engine configuration
//! - [`error`] - Engine and protocol error types

pub mod cache;
pub mod config;
pub mod constants;
pub mod error;
pub mod grants;
pub mod message;
pub mod pipeline;
pub mod response;
pub mod server;
pub mod ticket;
pub mod validator;

pub use cache::{CorrelationStore, RequestCache};
pub use config::ServerConfig;
pub use error::{EngineError, ErrorCode, ProtocolError};
pub use grants::{GrantType, TokenFlowState};
pub use message::{Message, RequestKind};
pub use pipeline::{
    DeserializeContext, GrantContext, HandleContext, NoopProvider, SerializeContext,
    ServerProvider, UserinfoClaims, UserinfoContext, ValidationContext, ValidationState,
};
pub use response::ResponseMode;
pub use server::{AuthorizationOutcome, EndpointResponse, ServerEngine};
pub use ticket::{Claim, Identity, Ticket, TicketProperties, TokenUsage};

/// Convenience alias for fallible engine operations.
pub type EngineResult<T> = std::result::Result<T, EngineError>;
