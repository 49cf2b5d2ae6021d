//! HTTP handlers for portal-service.

pub mod auth;
pub mod clients;
pub mod dashboard;
pub mod health;
pub mod invoices;
pub mod projects;
pub mod seed;
pub mod tasks;
