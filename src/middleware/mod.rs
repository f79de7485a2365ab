pub mod actor;
pub mod guard;
pub mod rate_limit;
pub mod response;

pub use actor::{resolve_actor_unified, Actor, ActorType};
pub use guard::{
    require_admin, require_admin_api, require_auth, require_auth_api, AdminUser, AuthUser, PageAdmin, PageUser, Role,
};
pub use rate_limit::{RateLimitDecision, RateLimiter};
pub use response::{ApiResponse, ApiResult};
