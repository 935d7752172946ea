//! Protocol shape validation.
//!
//! These checks are pure: they look only at the request and the engine
//! configuration, never at host state. Business rules (client lookup,
//! redirect URI allow-lists) belong to the provider's validate hooks.
//!
//! Checks run in a fixed order and the first failure wins.

use url::Url;

use crate::config::ServerConfig;
use crate::constants::{params, response_modes, scopes};
use crate::error::ProtocolError;
use crate::message::Message;

/// Validates the shape of an authorization request.
///
/// The ordered checks cover parameter presence, redirect URI syntax,
/// unsupported request objects, the response_type grammar and the
/// response_type/response_mode/scope/nonce interactions.
pub fn validate_authorization_request(
    request: &Message,
    config: &ServerConfig,
) -> Result<(), ProtocolError> {
    if request.client_id().is_none() {
        return Err(ProtocolError::invalid_request(
            "client_id was missing from the request",
        ));
    }

    match request.redirect_uri() {
        None => {
            // OpenID Connect requires redirect_uri; plain OAuth2 allows the
            // host to resolve a registered one later.
            if request.has_scope(scopes::OPENID) {
                return Err(ProtocolError::invalid_request(
                    "redirect_uri must be included when making an OpenID Connect request",
                ));
            }
        }

        Some(redirect_uri) => {
            let parsed = Url::parse(redirect_uri).map_err(|_| {
                ProtocolError::invalid_request("redirect_uri must be a valid absolute URI")
            })?;

            if parsed.fragment().is_some() {
                return Err(ProtocolError::invalid_request(
                    "redirect_uri must not include a fragment",
                ));
            }
        }
    }

    if request.contains(params::REQUEST) {
        return Err(ProtocolError::request_not_supported(
            "The request parameter is not supported",
        ));
    }

    if request.contains(params::REQUEST_URI) {
        return Err(ProtocolError::request_uri_not_supported(
            "The request_uri parameter is not supported",
        ));
    }

    if request.response_type().is_none() {
        return Err(ProtocolError::invalid_request(
            "response_type parameter missing",
        ));
    }

    if !request.is_none_flow()
        && !request.is_authorization_code_flow()
        && !request.is_implicit_flow()
        && !request.is_hybrid_flow()
    {
        return Err(ProtocolError::unsupported_response_type(
            "response_type unsupported",
        ));
    }

    if let Some(mode) = request.response_mode()
        && mode != response_modes::QUERY
        && mode != response_modes::FRAGMENT
        && mode != response_modes::FORM_POST
    {
        return Err(ProtocolError::invalid_request("response_mode unsupported"));
    }

    // Tokens delivered on the query string leak through browser history
    // and Referer headers.
    if request.is_query_response_mode()
        && (request.has_response_type(crate::constants::response_types::TOKEN)
            || request.has_response_type(crate::constants::response_types::ID_TOKEN))
    {
        return Err(ProtocolError::invalid_request(
            "response_type/response_mode combination unsupported",
        ));
    }

    if (request.is_implicit_flow() || request.is_hybrid_flow())
        && request.has_scope(scopes::OPENID)
        && request.get_non_empty(params::NONCE).is_none()
    {
        return Err(ProtocolError::invalid_request(
            "nonce parameter missing for an implicit or hybrid flow",
        ));
    }

    if request.has_response_type(crate::constants::response_types::ID_TOKEN)
        && !request.has_scope(scopes::OPENID)
    {
        return Err(ProtocolError::invalid_request(
            "openid scope missing for an id_token response",
        ));
    }

    if request.has_response_type(crate::constants::response_types::CODE)
        && !config.token_endpoint_enabled
    {
        return Err(ProtocolError::unsupported_response_type(
            "response_type=code is not supported by this server",
        ));
    }

    Ok(())
}

/// Extracts the access token presented to the userinfo endpoint.
///
/// The token comes from an `Authorization: Bearer` header, falling back to
/// the `access_token` request parameter. A missing or malformed credential
/// is `invalid_request`.
pub fn extract_access_token(
    authorization: Option<&str>,
    request: &Message,
) -> Result<String, ProtocolError> {
    if let Some(header) = authorization {
        let token = header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| {
                ProtocolError::invalid_request(
                    "The Authorization header must use the Bearer scheme",
                )
            })?;

        return Ok(token.to_owned());
    }

    request
        .access_token()
        .map(str::to_owned)
        .ok_or_else(|| ProtocolError::invalid_request("The access token is missing"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::message::RequestKind;

    fn request(pairs: &[(&str, &str)]) -> Message {
        let mut message = Message::new(RequestKind::Authorization);
        for (key, value) in pairs {
            message.set_parameter(*key, *value);
        }
        message
    }

    fn validate(pairs: &[(&str, &str)]) -> Result<(), ProtocolError> {
        validate_authorization_request(&request(pairs), &ServerConfig::default())
    }

    fn code_request() -> Vec<(&'static str, &'static str)> {
        vec![
            ("client_id", "client-1"),
            ("redirect_uri", "https://app.example.com/cb"),
            ("response_type", "code"),
            ("scope", "openid"),
            ("state", "xyz"),
            ("nonce", "abc"),
        ]
    }

    #[test]
    fn test_valid_code_request() {
        assert!(validate(&code_request()).is_ok());
    }

    #[test]
    fn test_missing_client_id() {
        let error = validate(&[("response_type", "code")]).unwrap_err();
        assert_eq!(error.error, ErrorCode::InvalidRequest);
        assert!(error.error_description.unwrap().contains("client_id"));
    }

    #[test]
    fn test_missing_redirect_uri_with_openid_scope() {
        let error = validate(&[
            ("client_id", "client-1"),
            ("response_type", "code"),
            ("scope", "openid"),
        ])
        .unwrap_err();
        assert_eq!(error.error, ErrorCode::InvalidRequest);
        assert!(error.error_description.unwrap().contains("redirect_uri"));
    }

    #[test]
    fn test_missing_redirect_uri_without_openid_scope_is_allowed() {
        assert!(validate(&[("client_id", "client-1"), ("response_type", "code")]).is_ok());
    }

    #[test]
    fn test_relative_redirect_uri() {
        let error = validate(&[
            ("client_id", "client-1"),
            ("redirect_uri", "/cb"),
            ("response_type", "code"),
        ])
        .unwrap_err();
        assert_eq!(error.error, ErrorCode::InvalidRequest);
        assert!(error.error_description.unwrap().contains("absolute"));
    }

    #[test]
    fn test_redirect_uri_with_fragment() {
        let error = validate(&[
            ("client_id", "client-1"),
            ("redirect_uri", "https://app.example.com/cb#frag"),
            ("response_type", "code"),
        ])
        .unwrap_err();
        assert!(error.error_description.unwrap().contains("fragment"));
    }

    #[test]
    fn test_request_object_not_supported() {
        let mut pairs = code_request();
        pairs.push(("request", "eyJhbGciOiJub25lIn0..."));
        let error = validate(&pairs).unwrap_err();
        assert_eq!(error.error, ErrorCode::RequestNotSupported);
    }

    #[test]
    fn test_request_uri_not_supported() {
        let mut pairs = code_request();
        pairs.push(("request_uri", "https://client.example.com/request.jwt"));
        let error = validate(&pairs).unwrap_err();
        assert_eq!(error.error, ErrorCode::RequestUriNotSupported);
    }

    #[test]
    fn test_missing_response_type() {
        let error = validate(&[
            ("client_id", "client-1"),
            ("redirect_uri", "https://app.example.com/cb"),
        ])
        .unwrap_err();
        assert_eq!(error.error, ErrorCode::InvalidRequest);
        assert!(error.error_description.unwrap().contains("response_type"));
    }

    #[test]
    fn test_unknown_response_type() {
        let error = validate(&[
            ("client_id", "client-1"),
            ("redirect_uri", "https://app.example.com/cb"),
            ("response_type", "device_code"),
        ])
        .unwrap_err();
        assert_eq!(error.error, ErrorCode::UnsupportedResponseType);
    }

    #[test]
    fn test_unknown_response_mode() {
        let mut pairs = code_request();
        pairs.push(("response_mode", "web_message"));
        let error = validate(&pairs).unwrap_err();
        assert_eq!(error.error, ErrorCode::InvalidRequest);
        assert!(error.error_description.unwrap().contains("response_mode"));
    }

    #[test]
    fn test_query_mode_with_token_rejected() {
        let error = validate(&[
            ("client_id", "client-1"),
            ("redirect_uri", "https://app.example.com/cb"),
            ("response_type", "code token"),
            ("response_mode", "query"),
            ("nonce", "abc"),
        ])
        .unwrap_err();
        assert_eq!(error.error, ErrorCode::InvalidRequest);
        assert!(error
            .error_description
            .unwrap()
            .contains("response_type/response_mode"));
    }

    #[test]
    fn test_implicit_flow_without_nonce() {
        let error = validate(&[
            ("client_id", "client-1"),
            ("redirect_uri", "https://app.example.com/cb"),
            ("response_type", "id_token token"),
            ("scope", "openid"),
        ])
        .unwrap_err();
        assert_eq!(error.error, ErrorCode::InvalidRequest);
        assert!(error.error_description.unwrap().contains("nonce"));
    }

    #[test]
    fn test_hybrid_flow_without_nonce() {
        let error = validate(&[
            ("client_id", "client-1"),
            ("redirect_uri", "https://app.example.com/cb"),
            ("response_type", "code id_token"),
            ("scope", "openid"),
        ])
        .unwrap_err();
        assert!(error.error_description.unwrap().contains("nonce"));
    }

    #[test]
    fn test_implicit_flow_without_openid_scope_needs_no_nonce() {
        // token-only implicit without openid is plain OAuth2.
        assert!(validate(&[
            ("client_id", "client-1"),
            ("redirect_uri", "https://app.example.com/cb"),
            ("response_type", "token"),
        ])
        .is_ok());
    }

    #[test]
    fn test_id_token_without_openid_scope() {
        let error = validate(&[
            ("client_id", "client-1"),
            ("redirect_uri", "https://app.example.com/cb"),
            ("response_type", "id_token"),
            ("scope", "profile"),
            ("nonce", "abc"),
        ])
        .unwrap_err();
        assert_eq!(error.error, ErrorCode::InvalidRequest);
        assert!(error.error_description.unwrap().contains("openid"));
    }

    #[test]
    fn test_code_with_disabled_token_endpoint() {
        let config = ServerConfig::default().with_token_endpoint_enabled(false);
        let error =
            validate_authorization_request(&request(&code_request()), &config).unwrap_err();
        assert_eq!(error.error, ErrorCode::UnsupportedResponseType);
    }

    #[test]
    fn test_first_failure_wins() {
        // Missing client_id outranks the bogus response_type.
        let error = validate(&[
            ("redirect_uri", "not a uri"),
            ("response_type", "bogus"),
        ])
        .unwrap_err();
        assert!(error.error_description.unwrap().contains("client_id"));
    }

    #[test]
    fn test_bearer_extraction_from_header() {
        let request = Message::new(RequestKind::Userinfo);
        let token = extract_access_token(Some("Bearer token-1"), &request).unwrap();
        assert_eq!(token, "token-1");
    }

    #[test]
    fn test_bearer_extraction_rejects_other_schemes() {
        let request = Message::new(RequestKind::Userinfo);
        let error = extract_access_token(Some("Basic dXNlcjpwdw=="), &request).unwrap_err();
        assert_eq!(error.error, ErrorCode::InvalidRequest);
    }

    #[test]
    fn test_bearer_extraction_rejects_empty_token() {
        let request = Message::new(RequestKind::Userinfo);
        assert!(extract_access_token(Some("Bearer "), &request).is_err());
    }

    #[test]
    fn test_bearer_extraction_falls_back_to_parameter() {
        let mut request = Message::new(RequestKind::Userinfo);
        request.set_parameter("access_token", "token-2");
        assert_eq!(
            extract_access_token(None, &request).unwrap(),
            "token-2"
        );
    }

    #[test]
    fn test_bearer_extraction_missing_token() {
        let request = Message::new(RequestKind::Userinfo);
        let error = extract_access_token(None, &request).unwrap_err();
        assert_eq!(error.error, ErrorCode::InvalidRequest);
    }
}
