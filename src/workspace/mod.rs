pub mod git;
pub mod manager;

pub use manager::WorkspaceManager;
