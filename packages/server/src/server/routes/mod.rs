// HTTP routes
pub mod account;
pub mod auth;
pub mod devices;
pub mod health;
pub mod transactions;

pub use account::*;
pub use auth::*;
pub use devices::*;
pub use health::*;
pub use transactions::*;
