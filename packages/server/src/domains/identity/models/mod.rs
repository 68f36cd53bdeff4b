pub mod identity;

pub use identity::{DisplayFields, Identity, IdentityStatus, NewIdentity};
