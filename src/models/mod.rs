pub mod diagnosis;
pub mod patient;

pub use diagnosis::*;
pub use patient::*;
