pub mod classify_types;
pub mod color_types;
