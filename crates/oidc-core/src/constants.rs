//! Wire-format constants for the OAuth 2.0 / OpenID Connect protocol.
//!
//! Parameter names, scope values, response types and the rest of the
//! protocol vocabulary are fixed by RFC 6749 and OpenID Connect Core.
//! Keeping them here avoids typo-prone string literals in handler code.

/// Request and response parameter names.
pub mod params {
    pub const ACCESS_TOKEN: &str = "access_token";
    pub const CLIENT_ID: &str = "client_id";
    pub const CLIENT_SECRET: &str = "client_secret";
    pub const CODE: &str = "code";
    pub const ERROR: &str = "error";
    pub const ERROR_DESCRIPTION: &str = "error_description";
    pub const ERROR_URI: &str = "error_uri";
    pub const EXPIRES_IN: &str = "expires_in";
    pub const GRANT_TYPE: &str = "grant_type";
    pub const ID_TOKEN: &str = "id_token";
    pub const NONCE: &str = "nonce";
    pub const PASSWORD: &str = "password";
    pub const REDIRECT_URI: &str = "redirect_uri";
    pub const REFRESH_TOKEN: &str = "refresh_token";
    pub const REQUEST: &str = "request";
    pub const REQUEST_ID: &str = "request_id";
    pub const REQUEST_URI: &str = "request_uri";
    pub const RESOURCE: &str = "resource";
    pub const RESPONSE_MODE: &str = "response_mode";
    pub const RESPONSE_TYPE: &str = "response_type";
    pub const SCOPE: &str = "scope";
    pub const STATE: &str = "state";
    pub const TOKEN: &str = "token";
    pub const TOKEN_TYPE: &str = "token_type";
    pub const TOKEN_TYPE_HINT: &str = "token_type_hint";
    pub const USERNAME: &str = "username";
}

/// `response_type` token values.
pub mod response_types {
    pub const CODE: &str = "code";
    pub const ID_TOKEN: &str = "id_token";
    pub const NONE: &str = "none";
    pub const TOKEN: &str = "token";
}

/// `response_mode` values.
pub mod response_modes {
    pub const FORM_POST: &str = "form_post";
    pub const FRAGMENT: &str = "fragment";
    pub const QUERY: &str = "query";
}

/// `grant_type` values.
pub mod grant_types {
    pub const AUTHORIZATION_CODE: &str = "authorization_code";
    pub const CLIENT_CREDENTIALS: &str = "client_credentials";
    pub const PASSWORD: &str = "password";
    pub const REFRESH_TOKEN: &str = "refresh_token";
}

/// Standard scope values.
pub mod scopes {
    pub const ADDRESS: &str = "address";
    pub const EMAIL: &str = "email";
    pub const OFFLINE_ACCESS: &str = "offline_access";
    pub const OPENID: &str = "openid";
    pub const PHONE: &str = "phone";
    pub const PROFILE: &str = "profile";
}

/// Userinfo and token claim names.
pub mod claims {
    pub const ADDRESS: &str = "address";
    pub const AUDIENCE: &str = "aud";
    pub const BIRTHDATE: &str = "birthdate";
    pub const EMAIL: &str = "email";
    pub const EMAIL_VERIFIED: &str = "email_verified";
    pub const FAMILY_NAME: &str = "family_name";
    pub const GIVEN_NAME: &str = "given_name";
    pub const ISSUER: &str = "iss";
    pub const PHONE_NUMBER: &str = "phone_number";
    pub const PHONE_NUMBER_VERIFIED: &str = "phone_number_verified";
    pub const PREFERRED_USERNAME: &str = "preferred_username";
    pub const PROFILE: &str = "profile";
    pub const SUBJECT: &str = "sub";
    pub const WEBSITE: &str = "website";
}

/// Keys used in the ticket property bag.
pub mod properties {
    pub const AUDIENCES: &str = ".audiences";
    pub const CONFIDENTIAL: &str = ".confidential";
    pub const NONCE: &str = ".nonce";
    pub const PRESENTERS: &str = ".presenters";
    pub const REDIRECT_URI: &str = ".redirect_uri";
    pub const RESOURCES: &str = ".resources";
    pub const SCOPES: &str = ".scopes";
    pub const USAGE: &str = ".usage";
}

/// `token_type` values.
pub mod token_types {
    pub const BEARER: &str = "bearer";
}

/// Content types accepted or produced by the engine.
pub mod content_types {
    pub const APPLICATION_JSON: &str = "application/json";
    pub const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";
}
