pub mod cache;
pub mod recorder;
pub mod roller;
