//! Data models for portal-service.

pub mod activity;
pub mod client;
pub mod invoice;
pub mod invoice_item;
pub mod payment;
pub mod project;
pub mod task;
pub mod user;

pub use activity::Activity;
pub use client::{Client, ClientWithStats, CreateClient, UpdateClient};
pub use invoice::{
    CreateInvoice, Invoice, InvoiceStatus, ListInvoicesFilter, PaymentTerms, UpdateInvoice,
};
pub use invoice_item::{CreateInvoiceItem, InvoiceItem, UpdateInvoiceItem};
pub use payment::{CreatePayment, Payment};
pub use project::{CreateProject, ListProjectsFilter, Project, ProjectStatus, UpdateProject};
pub use task::{CreateTask, Task, TaskPriority, TaskStatus, UpdateTask};
pub use user::{CreateUser, User};
