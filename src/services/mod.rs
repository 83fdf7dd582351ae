pub mod images;
pub mod trips;
