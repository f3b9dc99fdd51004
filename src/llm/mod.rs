mod generator;
mod model;
mod types;

pub use generator::*;
pub use model::*;
pub use types::*;
