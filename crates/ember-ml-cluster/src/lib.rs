pub mod kmeans;

pub use kmeans::*;
