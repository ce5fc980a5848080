//! Web module for hubrelay.
//!
//! Serves the WebSub callback endpoint: `GET /webhook` answers the hub's
//! verification of intent and `POST /webhook` receives content deliveries.

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;

pub use error::ApiError;
pub use router::create_router;
pub use server::WebServer;
