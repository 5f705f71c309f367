pub mod advisory;
pub mod fact;
pub mod query;
