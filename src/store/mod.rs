pub mod artifacts;
pub mod error;
pub mod forecast_store;
pub mod frame;
