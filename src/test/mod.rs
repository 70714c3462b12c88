pub mod test_classes;
pub mod test_closures;
pub mod test_fibers;
pub mod test_map;
