// HTTP middleware and extractors
pub mod device;
pub mod ip_extractor;
pub mod jwt_auth;
pub mod rate_limit;

pub use device::*;
pub use ip_extractor::*;
pub use jwt_auth::*;
pub use rate_limit::*;
