//! Seed client data models

use std::fmt;

/// Secret key holding the vSphere user name
pub const USERNAME_KEY: &str = "vsphereUsername";

/// Secret key holding the vSphere password
pub const PASSWORD_KEY: &str = "vspherePassword";

/// vSphere credentials read from the cloud provider secret
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// vSphere user name
    pub username: String,
    /// vSphere password
    pub password: String,
}

impl Credentials {
    /// Create credentials from user name and password
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
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
