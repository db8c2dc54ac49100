//! API route modules.

pub mod relay;
pub mod status;
