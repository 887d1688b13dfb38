//! Procedural macros for declarative event emission in the eventflow
//! dispatch core.
//!
//! This crate provides `#[emit_on_success(...)]`, which turns a domain
//! service method's successful completion into a published event without
//! threading a bus handle through every call site.

mod emit;

use proc_macro::TokenStream;
use syn::{ItemFn, parse_macro_input};

/// Publishes an event whenever the decorated `async fn` returns `Ok`.
///
/// By default, the event's data is extracted from the call's own arguments
/// (not its return value): the conventional keys `order_id`, `id_order`,
/// `id`, `customer_id`, and `product_id` are looked up directly among the
/// arguments, then inside any argument that is itself an object. If nothing
/// matches, no event is published at all.
///
/// # Arguments
///
/// - `event_type = "..."` (required) — the event type string to publish.
/// - `source = "..."` (optional) — overrides the default
///   `{module_path}::{function_name}` emission metadata source.
/// - `condition = "path::to::fn"` (optional) — a `fn(&T) -> bool` checked
///   against the `Ok` value; emission is skipped when it returns `false`.
/// - `data_extractor = "path::to::fn"` (optional) — a
///   `fn(&CallArgs, &T) -> HashMap<String, Value>` replacing the default
///   data extraction.
/// - `metadata_extractor = "path::to::fn"` (optional) — same shape,
///   replacing the default metadata extraction.
///
/// ```rust,ignore
/// use eventflow_macros::emit_on_success;
///
/// #[emit_on_success(event_type = "order_created")]
/// async fn create_order(&self, request: CreateOrderRequest) -> Result<Order, OrderError> {
///     // ...
/// }
/// ```
#[proc_macro_attribute]
pub fn emit_on_success(attr: TokenStream, item: TokenStream) -> TokenStream {
    let item_fn = parse_macro_input!(item as ItemFn);

    let args = match emit::parse_args(attr) {
        Ok(args) => args,
        Err(err) => return err.to_compile_error().into(),
    };

    match emit::expand(args, item_fn) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}
