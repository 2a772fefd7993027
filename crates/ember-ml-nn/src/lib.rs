pub mod layers;
pub mod network;

pub use layers::*;
pub use network::*;
