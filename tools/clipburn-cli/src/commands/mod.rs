pub mod check;
pub mod config;
pub mod graph;
pub mod normalize;
pub mod render;
