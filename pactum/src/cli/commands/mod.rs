pub mod books;
pub mod config;
