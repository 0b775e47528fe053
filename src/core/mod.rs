pub mod alignment;
pub mod doc_types;
pub mod lifecycle;
pub mod links;
pub mod loader;
pub mod pipeline;
pub mod placeholder;
pub mod report;
pub mod rubric;
pub mod scorer;
pub mod settings;
pub mod template;
