pub mod note;
pub mod profile;
