//! Entity graph storage: entities, their labels and their properties

mod entity;
mod label;
mod property;

pub use entity::SqliteEntityStore;
