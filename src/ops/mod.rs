pub mod cascade;
pub mod display;
pub mod ordering;
pub mod time_grid;
