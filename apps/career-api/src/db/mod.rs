pub mod directory;
pub mod pool;
pub mod schema;
