//! HTTP admission middleware and server.

mod admission;
mod server;

pub use admission::{enforce, with_admission, ErrorBody};
pub use server::{default_routes, HttpServer};
