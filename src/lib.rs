//! The routing and request-modeling core of a lightweight HTTP framework
//! built on an async server-gateway protocol.
//!
//! The transport collaborator parses the wire and hands this crate one
//! [`Scope`] per request plus a receive channel for body chunks and a send
//! channel for response events. This crate preprocesses the scope into
//! routing metadata (subdomain, normalized headers), wraps it in a lazily
//! parsed [`HttpRequest`], resolves the handler through the [`Router`]'s
//! segment trie, and runs the middleware chain against a
//! [`ResponseWriter`] that is flushed once at the end.
//!
//! # Example
//!
//! ```
//! use gateling::router::{get, handler_fn};
//! use gateling::{BodySource, Router, Scope};
//! use http::Method;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let router = Router::builder()
//!     .route(
//!         "/customers/:id/orders",
//!         get(handler_fn(|req, res, _ctx| {
//!             Box::pin(async move {
//!                 let id = req.params()?.get("id").and_then(|v| v.as_str()).unwrap_or_default().to_string();
//!                 res.set_body(format!("orders of customer {id}"));
//!                 Ok(())
//!             })
//!         })),
//!     )
//!     .build()
//!     .unwrap();
//!
//! let scope = Scope::new(Method::GET, "/customers/23/orders").with_header("host", "api.example.com");
//! let response = router.dispatch(scope, BodySource::Empty).await;
//! assert_eq!(response.status(), http::StatusCode::OK);
//! # }
//! ```

mod body;
mod context;
mod error;
mod request;
mod response;
mod scope;

pub mod gateway;
pub mod router;

pub use body::{BodySource, Content};
pub use context::{Context, Key};
pub use error::{BodyError, DecodeError, FlushError, HandlerError, RouteError};
pub use gateway::{BodyReceiver, ReceiveEvent, ResponseSender, SendEvent};
pub use request::{HttpRequest, ParamValue, Params};
pub use response::ResponseWriter;
pub use router::{Flow, Handler, Middleware, Router};
pub use scope::{preprocess, HeaderEntry, HeaderMap, HostPort, Metadata, Scope};
