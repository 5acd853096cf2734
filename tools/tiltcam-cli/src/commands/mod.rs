pub mod classify;
pub mod constraints;
pub mod replay;
