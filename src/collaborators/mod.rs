//! Built-in topic collaborators.

pub mod llm;
pub mod static_partition;

pub use llm::LlmCollaborator;
pub use static_partition::StaticPartition;
