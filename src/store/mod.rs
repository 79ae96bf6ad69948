pub mod item_store;
pub mod block_store;

pub use item_store::ItemStore;
pub use block_store::BlockStore;
