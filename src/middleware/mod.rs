// Middleware shared by every route

pub mod cors;

pub use cors::*;
