pub mod core;
pub mod participant;
pub mod project;
