//! Healthcare savings estimator for hospital and surgical insurance (HSIT)
//! plan holders: a deterministic projection engine and its HTTP surface.

pub mod api;
pub mod core;
pub mod store;
