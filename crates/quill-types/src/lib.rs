pub mod access;
pub mod api;
pub mod events;
pub mod models;
