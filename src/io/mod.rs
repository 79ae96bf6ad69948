pub mod bus;
pub mod config_io;
pub mod document_store;
pub mod persistence;
