//! Portfolio stores. The application database is external; the in-memory
//! store serves the CLI and tests.

pub mod memory;

pub use memory::MemoryPortfolioRepository;
