pub mod call;
pub mod feedback;
pub mod proctoring;
