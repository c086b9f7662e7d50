//! API Module
//!
//! HTTP handlers and routing for the image cache service.
//!
//! # Endpoints
//! - `POST /prefetch` - Warm the cache from a document payload
//! - `GET /image?url=` - Fetch one (transformed) image
//! - `GET /warmup` - Pre-connect to configured upstream hosts
//! - `GET /stats` - Get cache statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
