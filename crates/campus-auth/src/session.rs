//! Session issuance and lazy expiry.
//!
//! Sessions are short-lived records minted from verified identity claims.
//! There is no automatic renewal: a caller whose session has expired must
//! re-authenticate. Expired records are evicted lazily on first access at
//! or after their expiry instant.

use crate::role::Role;
use campus_core::{ErrorBody, ErrorCode};
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};
use uuid::Uuid;

/// Verified identity claims used to mint a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityClaims {
    pub user_id: String,
    pub tenant_id: String,
    pub role: Role,
    /// Explicit scope grants; when empty, role defaults apply.
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

/// A scoped, short-lived session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub user_id: String,
    pub tenant_id: String,
    pub role: Role,
    /// Ordered, deduplicated scope grants.
    pub scopes: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Session {
    /// True at or after the expiry instant.
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// Issues and expires sessions. Owned by the host context; no other
/// component writes session records.
pub struct SessionManager {
    ttl: Duration,
    table: RwLock<HashMap<Uuid, Session>>,
}

impl SessionManager {
    /// Manager with the fixed one-hour session lifetime.
    pub fn new() -> Self {
        Self::with_ttl(Duration::hours(1))
    }

    /// Override the TTL. Intended for tests; production uses the fixed
    /// one-hour lifetime.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            table: RwLock::new(HashMap::new()),
        }
    }

    /// Mint a session from verified claims.
    ///
    /// When the claims carry no explicit scopes, the role's default scopes
    /// apply, so an authenticated non-guest session never has an empty
    /// scope set.
    pub fn create_session(&self, claims: IdentityClaims) -> Session {
        let scopes = if claims.scopes.is_empty() {
            claims.role.default_scopes()
        } else {
            dedup_preserving_order(claims.scopes)
        };

        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4(),
            user_id: claims.user_id,
            tenant_id: claims.tenant_id,
            role: claims.role,
            scopes,
            created_at: now,
            expires_at: now + self.ttl,
            metadata: claims.metadata,
        };

        info!(
            session_id = %session.id,
            user_id = %session.user_id,
            tenant_id = %session.tenant_id,
            role = ?session.role,
            scopes = session.scopes.len(),
            "Session created"
        );

        self.table.write().insert(session.id, session.clone());
        session
    }

    /// Fetch a live session. Returns `None` for unknown ids and for
    /// expired ones; expired records are evicted on the way out.
    pub fn get_session(&self, id: Uuid) -> Option<Session> {
        let expired = {
            let table = self.table.read();
            match table.get(&id) {
                Some(session) if session.is_expired() => true,
                Some(session) => return Some(session.clone()),
                None => return None,
            }
        };
        if expired {
            self.table.write().remove(&id);
            debug!(session_id = %id, "Evicted expired session");
        }
        None
    }

    /// Like [`get_session`](Self::get_session), but distinguishes an
    /// unknown id (`UNAUTHORIZED`) from an expired one (`SESSION_EXPIRED`)
    /// for the API layer.
    pub fn resolve(&self, id: Uuid) -> Result<Session, ErrorBody> {
        let known = self.table.read().contains_key(&id);
        match self.get_session(id) {
            Some(session) => Ok(session),
            None if known => Err(ErrorBody {
                code: ErrorCode::SessionExpired,
                message: format!("Session {id} has expired"),
                details: None,
            }),
            None => Err(ErrorBody {
                code: ErrorCode::Unauthorized,
                message: "No valid session".to_string(),
                details: None,
            }),
        }
    }

    /// Explicitly destroy a session (logout).
    pub fn destroy(&self, id: Uuid) -> bool {
        self.table.write().remove(&id).is_some()
    }

    /// Number of stored records, including not-yet-evicted expired ones.
    pub fn session_count(&self) -> usize {
        self.table.read().len()
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

fn dedup_preserving_order(scopes: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    scopes.into_iter().filter(|s| seen.insert(s.clone())).collect()
}
