pub mod crawler;
pub mod error;
