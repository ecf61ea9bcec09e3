pub mod camera;
pub mod classifier;
pub mod events;
pub mod grass_service;
pub mod image_source;
pub mod screen;
