// * Integration clients: shared HTTP plumbing plus one client per external system

pub mod auth;
pub mod client;
pub mod deployment;
pub mod errors;
pub mod incident;
pub mod tracker;

pub use auth::Credentials;
pub use client::ServiceClient;
pub use deployment::DeploymentClient;
pub use errors::ClientError;
pub use incident::IncidentClient;
pub use tracker::{analyze_tickets, Project, Ticket, TicketAnalysis, TrackerClient};
