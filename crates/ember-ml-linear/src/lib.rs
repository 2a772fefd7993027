pub mod logistic;
pub mod regression;
mod solve;

pub use logistic::*;
pub use regression::*;
