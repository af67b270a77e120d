#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! # rpc-proxy-macros
//!
//! ## `#[service_proxy]`
//!
//! Generates the client adapter for an async service trait. Every method
//! becomes a thin wrapper that packs its arguments into an ordered
//! `Parameters` map and hands them to the shared `ProxyBase` engine under a
//! service id fixed at compile time.
//!
//! ### Example
//!
//! ```ignore
//! use rpc_proxy::{service_proxy, ProxyError};
//!
//! #[service_proxy(namespace = "shop.orders")]
//! pub trait OrderService {
//!     async fn get(&self, id: u64) -> Result<Order, ProxyError>;
//!     async fn cancel(&self, id: u64, reason: String) -> Result<(), ProxyError>;
//! }
//! ```
//!
//! expands to the trait (made `Send + Sync` and `#[async_trait]` when it is
//! not already), an `OrderServiceProxy` struct implementing it, the method
//! and interface descriptors, and an `inventory` registration. The service id
//! of `get` above is `shop.orders.OrderService.get_id`.
//!
//! ### Arguments
//!
//! - `namespace = "..."` - id namespace; defaults to `module_path!()`
//! - `name = "..."` - adapter type name; defaults to `<Trait>Proxy`

use proc_macro::TokenStream;

mod service_proxy;

/// Generate a service proxy adapter for an async trait.
///
/// Place it above `#[async_trait]` if the trait carries one.
#[proc_macro_attribute]
pub fn service_proxy(attr: TokenStream, item: TokenStream) -> TokenStream {
    service_proxy::expand(attr.into(), item.into()).into()
}
