pub mod adapters;
pub mod catalog;
pub mod errors;
pub mod models;
pub mod registry;
pub mod render;
