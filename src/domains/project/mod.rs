pub mod repository;
pub mod types;

pub use repository::{ProjectRepository, SqliteProjectRepository};
pub use types::{NewProject, Project};
