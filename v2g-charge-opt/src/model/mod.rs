pub mod constraints;
pub mod cost;
