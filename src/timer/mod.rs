pub mod engine;
pub mod model;
pub mod tick;
pub mod token;
