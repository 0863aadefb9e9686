//! Authentication primitives for the campus capability host: scope
//! matching, the role catalog with role-derived default scopes, and the
//! in-memory session manager.

pub mod role;
pub mod scope;
pub mod session;

pub use role::Role;
pub use scope::{has_scope, missing_scopes, scope_prefix};
pub use session::{IdentityClaims, Session, SessionManager};
