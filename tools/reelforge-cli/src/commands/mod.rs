pub mod build;
pub mod captions;
pub mod check;
pub mod info;
pub mod render;
