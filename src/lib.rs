pub mod agents;
pub mod collab;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod publisher;
pub mod server;
pub mod shutdown;
pub mod workspace;
