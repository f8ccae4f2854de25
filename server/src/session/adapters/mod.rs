mod file;
mod in_memory;

pub use file::FileConversationStore;
pub use in_memory::InMemoryConversationStore;
