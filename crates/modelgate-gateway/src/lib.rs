//! `modelgate-gateway` — protocol front-ends and HTTP server.
//!
//! Three surfaces over one internal contract:
//!
//! - REST ([`frontends::rest`]): JSON request/response, the primary surface.
//! - Query-string ([`frontends::query`]): GET-only search for simple callers.
//! - WebSocket ([`frontends::stream`]): one envelope per frame, one reply per
//!   envelope.
//!
//! All three normalize into a [`modelgate_core::GatewayRequest`] and call the
//! pattern dispatcher; none holds protocol-specific state past the request.

pub mod error;
pub mod frontends;
pub mod handlers;
pub mod server;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use server::GatewayServer;
pub use state::AppState;
