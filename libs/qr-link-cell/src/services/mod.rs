pub mod image;
pub mod linking;
pub mod token;
