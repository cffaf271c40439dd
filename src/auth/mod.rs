//! Credential authentication — password hashing, bearer sessions, routes.

pub mod password;
pub mod routes;
pub mod session;

pub use password::{hash_password, verify_password};
pub use routes::{AuthRouteState, auth_routes};
pub use session::{Identity, authenticate, bearer_token, new_session};
