pub mod cinema;
pub mod movie;
