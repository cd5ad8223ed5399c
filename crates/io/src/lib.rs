// File I/O operations

pub mod export;
pub mod table;
