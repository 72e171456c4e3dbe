pub mod handlers;
pub mod listing;
pub mod metadata;
pub mod resolver;
