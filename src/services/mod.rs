pub mod classifier;
pub mod color_service;
pub mod ensemble;
pub mod extraction_service;
pub mod taxonomy;
