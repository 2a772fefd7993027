pub mod svc;

pub use svc::*;
