pub mod fallback;
pub mod model;
pub mod normalizer;
pub mod schema;
