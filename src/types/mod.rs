pub mod forecast;
pub mod location;
pub mod parameter;
