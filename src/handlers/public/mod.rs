// handlers/public/mod.rs - Public handlers (no credential required)
//
// Service info, health and the sign-in callback that turns an authorization
// code into a session cookie.
//
// Route Prefix: none (/, /health, /auth/*)

pub mod callback;
pub mod system;

pub use callback::auth_callback;
pub use system::{health, root};
