// handlers/protected/mod.rs - Protected handlers (resolved actor required)
//
// Every handler here resolves the caller with the `Actor` extractor, so the
// same route serves a signed-in human and a bearer-token agent. Each one
// counts the request against the caller's rate limit before doing any work.
//
// Route Prefix: /api/* (/api/auth/whoami, /api/data/*, /api/files, /api/ai/*)

pub mod ai;
pub mod collection;
pub mod files;
pub mod whoami;

pub use ai::complete;
pub use collection::{list as collection_list, record_delete, record_restore};
pub use files::upload;
pub use whoami::whoami;
