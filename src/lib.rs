pub mod display;
pub mod errors;
pub mod invoke;
pub mod measure;
pub mod parse;
pub mod plan;
pub mod probe;
pub mod types;
pub mod verify;
