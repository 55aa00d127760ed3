pub mod collision;
pub mod event;
pub mod map;
pub mod screen;
pub mod step;
pub mod world;
