//! HTTP Basic authentication (RFC 7617).

use base64::Engine;

use crate::remote::Credentials;

/// Generates a Basic authentication header value.
pub fn basic_auth(username: &str, password: &str) -> String {
    let credentials = format!("{}:{}", username, password);
    let encoded = base64::engine::general_purpose::STANDARD.encode(credentials);
    format!("Basic {}", encoded)
}

/// The `Authorization` header for session credentials.
pub fn authorization(credentials: &Credentials) -> String {
    basic_auth(credentials.address(), credentials.secret())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_auth_encoding() {
        // base64("user:password") = "dXNlcjpwYXNzd29yZA=="
        assert_eq!(basic_auth("user", "password"), "Basic dXNlcjpwYXNzd29yZA==");
    }

    #[test]
    fn authorization_uses_address_as_username() {
        let credentials = Credentials::new("owner@example.com", "s3cret");
        let expected = basic_auth("owner@example.com", "s3cret");
        assert_eq!(authorization(&credentials), expected);
    }
}
