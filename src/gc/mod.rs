pub mod arena;
pub mod collector;
pub mod id;
