pub mod predict;
pub mod tree;
pub mod warm_start;
