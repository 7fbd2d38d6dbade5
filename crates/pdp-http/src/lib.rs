//! The HTTP surface: an axum router over a single shared
//! [`pdp_core::PdpService`], built by `create_router(state)`
//! plus Swagger/Scalar docs wiring.

pub mod error;
mod routes;

pub use routes::create_router;
