//! State layer construction

mod builder;
mod layer;

pub use builder::{Muninn, MuninnBuilder};
pub use layer::StateLayer;
