//! Socket role registry. Clients register with a static token and get a role
//! for the lifetime of their connection; unknown tokens are disconnected.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Parent,
    Driver,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Parent => "parent",
            Role::Driver => "driver",
        }
    }

    /// Static registration tokens, plus the bare role names kept for the
    /// dashboard transition window.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "admin123" | "admin" => Some(Role::Admin),
            "parent123" | "parent" => Some(Role::Parent),
            "driver123" | "driver" => Some(Role::Driver),
            _ => None,
        }
    }
}

pub struct AuthEngine {
    roles: RwLock<HashMap<String, Role>>, // socket_id -> role
}

impl AuthEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { roles: RwLock::new(HashMap::new()) })
    }

    pub async fn set_role(&self, socket_id: &str, role: Role) {
        self.roles.write().await.insert(socket_id.to_string(), role);
    }

    pub async fn get_role(&self, socket_id: &str) -> Option<Role> {
        self.roles.read().await.get(socket_id).copied()
    }

    pub async fn remove_role(&self, socket_id: &str) {
        self.roles.write().await.remove(socket_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_resolution() {
        assert_eq!(Role::from_token("admin123"), Some(Role::Admin));
        assert_eq!(Role::from_token("parent"), Some(Role::Parent));
        assert_eq!(Role::from_token("driver123"), Some(Role::Driver));
        assert_eq!(Role::from_token("stranger"), None);
    }

    #[tokio::test]
    async fn roles_are_per_socket() {
        let auth = AuthEngine::new();
        auth.set_role("s1", Role::Admin).await;
        auth.set_role("s2", Role::Parent).await;
        assert_eq!(auth.get_role("s1").await, Some(Role::Admin));
        assert_eq!(auth.get_role("s2").await, Some(Role::Parent));

        auth.remove_role("s1").await;
        assert_eq!(auth.get_role("s1").await, None);
        assert_eq!(auth.get_role("s2").await, Some(Role::Parent));
    }
}
