//! User context for membership-scoped database operations
//!
//! Every mutation a user drives carries the acting user id. Repositories use
//! it to resolve memberships; services use it for authorization.

/// Acting user, as forwarded by the authenticating gateway
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserContext {
    pub user_id: String,
}

impl UserContext {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
        }
    }

    /// Parse a header value; blank ids are rejected
    pub fn from_header(value: &str) -> Option<Self> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self::new(trimmed))
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }
}

impl std::fmt::Display for UserContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "UserContext({})", self.user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_header_trims() {
        let ctx = UserContext::from_header("  user-1 ").unwrap();
        assert_eq!(ctx.user_id(), "user-1");
    }

    #[test]
    fn test_blank_header_rejected() {
        assert!(UserContext::from_header("   ").is_none());
        assert!(UserContext::from_header("").is_none());
    }
}
