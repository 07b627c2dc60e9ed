//! Remote backend: providers that forward every call over HTTP.
//!
//! The service is expected to follow these conventions for each kind served
//! under `{base}/{path}`:
//!
//! ```text
//! GET    {path}/e/{id}[?all=true]        -> full entity JSON, 404 when absent
//! GET    {path}?q=..&count=..&state=..   -> {"offset": n, "col": [...], "total": n}
//! PUT    {path}/e/{id}   [If-Match: "rev"] -> {"state", "code", "message", "data"}
//! DELETE {path}/e/{id}                   -> {"state", "code", "message"}
//! GET    {source_path}/{id}/revisions    -> collection of revisions
//! ```
//!
//! Each request carries the tenant, correlation id and user of the
//! [`RequestContext`](crate::tenant::RequestContext) as headers. Mutation
//! responses are read as change envelopes whatever their status; responses
//! without an envelope are classified by status code.

mod client;
mod config;
mod provider;

pub use client::RemoteClient;
pub use config::{CORRELATION_HEADER, RemoteConfig, TENANT_HEADER, USER_HEADER};
pub use provider::RemoteProvider;
