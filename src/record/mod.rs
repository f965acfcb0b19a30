pub mod model;

pub use model::Record;
