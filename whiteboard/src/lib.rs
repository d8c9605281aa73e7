pub mod application;
pub mod models;
pub mod settings;
