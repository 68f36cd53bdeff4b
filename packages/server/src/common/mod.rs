// Common types and utilities shared across the application

pub mod entity_ids;
pub mod id;
pub mod money;
pub mod pagination;
pub mod phone;

pub use entity_ids::*;
pub use id::Id;
pub use money::{Amount, InvalidAmount};
pub use pagination::{
    trim_results, Cursor, Page, PageRequest, ValidatedPage, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE,
};
pub use phone::{mask_phone_number, normalize_phone_number};
