pub mod issue;
pub mod phase;
