pub mod identifier;
pub mod repository;

pub use identifier::IdentifierCodec;
pub use repository::{FindById, HardDeletable};
