pub mod auth;
pub mod machines;
