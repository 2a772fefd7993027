pub mod dtype;
pub mod error;
pub mod random;
pub mod shape;
pub mod tensor;
pub mod validate;

pub use dtype::Float;
pub use error::{MlError, MlResult};
pub use random::rng_from_seed;
pub use shape::Shape;
pub use tensor::Tensor;
