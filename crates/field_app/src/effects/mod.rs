pub mod ticker;
pub mod visit_api;
