pub mod inference;
pub mod model_manager;
pub mod service;
pub mod variants;
