pub mod item;
pub mod block;
pub mod event;
pub mod config;

pub use item::*;
pub use block::*;
pub use event::*;
pub use config::*;
