mod animator;
mod avatar;
mod buffer;
mod cache;
mod camera;
mod editor;
mod error;
mod export;
mod frame_pack;
mod frenet;
mod gaussian;
mod layout;
mod npy;
mod query;
mod scene;
mod session;

pub use glam;

pub use animator::*;
pub use avatar::*;
pub use buffer::*;
pub use cache::*;
pub use camera::*;
pub use editor::*;
pub use error::*;
pub use export::*;
pub use frame_pack::*;
pub use frenet::*;
pub use gaussian::*;
pub use layout::*;
pub use npy::*;
pub use query::*;
pub use scene::*;
pub use session::*;
