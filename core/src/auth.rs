//! Basic authentication credentials.

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Username and password held for the lifetime of a client.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Login name; the password has no accessor.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Value for the `authorization` header: `Basic base64(user:password)`.
    pub fn basic_auth_header(&self) -> String {
        let encoded = STANDARD.encode(format!("{}:{}", self.username, self.password));
        format!("Basic {encoded}")
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_auth_header_encodes_user_and_password() {
        let creds = Credentials::new("Aladdin", "open sesame");
        assert_eq!(creds.basic_auth_header(), "Basic QWxhZGRpbjpvcGVuIHNlc2FtZQ==");
    }

    #[test]
    fn colon_in_password_is_kept() {
        let creds = Credentials::new("user", "pa:ss");
        assert_eq!(creds.basic_auth_header(), format!("Basic {}", STANDARD.encode("user:pa:ss")));
    }

    #[test]
    fn username_is_exposed_unchanged() {
        assert_eq!(Credentials::new("api-login", "pw").username(), "api-login");
    }

    #[test]
    fn debug_redacts_password() {
        let rendered = format!("{:?}", Credentials::new("login", "hunter2"));
        assert!(rendered.contains("login"));
        assert!(!rendered.contains("hunter2"));
    }
}
