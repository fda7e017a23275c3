pub mod health;
pub mod initialize;
pub mod process;
pub mod result;
