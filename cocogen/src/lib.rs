// #![warn(rust_2018_idioms)]

pub mod driver;
pub mod source;

// Frontend
pub mod check;
pub mod model;
pub mod surface;

// Backend
pub mod codegen;
pub mod filegen;
pub mod hash;

pub mod runtime;

pub use driver::{Driver, Status};
