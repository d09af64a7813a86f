pub mod featured;
pub mod media;
pub mod programs;
pub mod trips;
