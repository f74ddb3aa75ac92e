//! Who is calling: a signed-in account or an anonymous device.

use std::fmt;

use crate::config::AccountCfg;

#[derive(Clone)]
pub struct AuthContext {
    pub is_guest: bool,
    pub display_name: Option<String>,
    pub device_id: String,
    access_token: Option<String>,
}

impl AuthContext {
    pub fn guest(device_id: impl Into<String>) -> Self {
        Self {
            is_guest: true,
            display_name: None,
            device_id: device_id.into(),
            access_token: None,
        }
    }

    pub fn signed_in(
        token: impl Into<String>,
        display_name: impl Into<String>,
        device_id: impl Into<String>,
    ) -> Self {
        let name = display_name.into();
        Self {
            is_guest: false,
            display_name: (!name.is_empty()).then_some(name),
            device_id: device_id.into(),
            access_token: Some(token.into()),
        }
    }

    /// Guest unless the account section carries a token.
    pub fn from_config(account: &AccountCfg, device_id: String) -> Self {
        let token = account.access_token.trim();
        if token.is_empty() {
            Self::guest(device_id)
        } else {
            Self::signed_in(token, account.display_name.trim(), device_id)
        }
    }

    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    /// Short label for the status bar.
    pub fn badge(&self) -> String {
        match (&self.display_name, self.is_guest) {
            (_, true) => "Guest".into(),
            (Some(name), false) => format!("Signed in as {name}"),
            (None, false) => "Signed in".into(),
        }
    }
}

impl fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthContext")
            .field("is_guest", &self.is_guest)
            .field("display_name", &self.display_name)
            .field("device_id", &self.device_id)
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_token_means_guest() {
        let account = AccountCfg {
            access_token: "  ".into(),
            display_name: "Kit".into(),
        };
        let auth = AuthContext::from_config(&account, "dev".into());
        assert!(auth.is_guest);
        assert_eq!(auth.access_token(), None);
        assert_eq!(auth.badge(), "Guest");
    }

    #[test]
    fn test_debug_hides_token() {
        let auth = AuthContext::signed_in("secret-token", "Kit", "dev");
        let shown = format!("{auth:?}");
        assert!(!shown.contains("secret-token"));
        assert_eq!(auth.badge(), "Signed in as Kit");
    }
}
