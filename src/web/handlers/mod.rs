//! # Web API Request Handlers

pub mod callbacks;
pub mod health;
pub mod tasks;
pub mod tenant_instances;
