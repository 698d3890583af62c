pub mod employee;
pub mod record;
