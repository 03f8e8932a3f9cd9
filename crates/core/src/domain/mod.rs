pub mod ids;
pub mod reaction;
pub mod ticket;
