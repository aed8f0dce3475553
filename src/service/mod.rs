pub mod experience;
pub mod identity;
pub mod insights;
pub mod materializer;
