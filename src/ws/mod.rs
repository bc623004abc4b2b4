pub mod gate;
pub mod handler;
pub mod protocol;
