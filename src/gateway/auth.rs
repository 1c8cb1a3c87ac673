//! API Key Authentication

use subtle::ConstantTimeEq;

/// Shared-secret check for the X-API-Key header
#[derive(Clone)]
pub struct ApiKeyAuth {
    secret: String,
}

impl ApiKeyAuth {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Fails closed: a missing key, or an unconfigured secret, never passes
    pub fn verify(&self, presented: Option<&str>) -> bool {
        match presented {
            Some(key) if !self.secret.is_empty() => {
                key.as_bytes().ct_eq(self.secret.as_bytes()).into()
            }
            _ => false,
        }
    }
}

impl std::fmt::Debug for ApiKeyAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeyAuth").field("secret", &"<redacted>").finish()
    }
}
