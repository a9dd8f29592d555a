mod composite;
mod ply;

pub use composite::*;
pub use ply::*;
