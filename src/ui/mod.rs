pub mod reader;
pub mod windows;
