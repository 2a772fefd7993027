pub mod compress;
pub mod spec;

pub use compress::*;
pub use spec::*;
