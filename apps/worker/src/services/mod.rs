//! HTTP handlers, one module per surface.

pub mod health_service;
pub mod hook_service;
pub mod item_service;
pub mod mirror_service;
