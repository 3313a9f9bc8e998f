pub mod error;
pub mod function;
pub mod grid;
pub mod plugin;
pub mod sink;
pub mod types;

pub use plugin::FunctionGraphPlugin;
