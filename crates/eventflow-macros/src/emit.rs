//! Implementation of the `#[emit_on_success]` attribute macro.

use proc_macro2::TokenStream;
use quote::quote;
use syn::parse::Parser;
use syn::punctuated::Punctuated;
use syn::{Expr, ExprLit, FnArg, ItemFn, Lit, MetaNameValue, Pat, Path, Token};

/// Parsed arguments to `#[emit_on_success(...)]`.
pub struct EmitArgs {
    event_type: String,
    source: Option<String>,
    condition: Option<Path>,
    data_extractor: Option<Path>,
    metadata_extractor: Option<Path>,
}

pub fn parse_args(attr: proc_macro::TokenStream) -> syn::Result<EmitArgs> {
    let parser = Punctuated::<MetaNameValue, Token![,]>::parse_terminated;
    let parsed = parser.parse(attr)?;

    let mut event_type = None;
    let mut source = None;
    let mut condition = None;
    let mut data_extractor = None;
    let mut metadata_extractor = None;

    for entry in parsed {
        let ident = entry
            .path
            .get_ident()
            .map(|ident| ident.to_string())
            .unwrap_or_default();

        match ident.as_str() {
            "event_type" => event_type = Some(lit_str(&entry.value)?),
            "source" => source = Some(lit_str(&entry.value)?),
            "condition" => condition = Some(syn::parse_str::<Path>(&lit_str(&entry.value)?)?),
            "data_extractor" => data_extractor = Some(syn::parse_str::<Path>(&lit_str(&entry.value)?)?),
            "metadata_extractor" => metadata_extractor = Some(syn::parse_str::<Path>(&lit_str(&entry.value)?)?),
            other => {
                return Err(syn::Error::new_spanned(
                    entry.path,
                    format!("unknown `emit_on_success` argument `{other}`"),
                ));
            }
        }
    }

    let event_type = event_type.ok_or_else(|| {
        syn::Error::new(
            proc_macro2::Span::call_site(),
            "`emit_on_success` requires `event_type = \"...\"`",
        )
    })?;

    Ok(EmitArgs {
        event_type,
        source,
        condition,
        data_extractor,
        metadata_extractor,
    })
}

fn lit_str(expr: &Expr) -> syn::Result<String> {
    match expr {
        Expr::Lit(ExprLit { lit: Lit::Str(value), .. }) => Ok(value.value()),
        other => Err(syn::Error::new_spanned(other, "expected a string literal")),
    }
}

/// Rewrites an async method so that, after it returns `Ok`, an event is
/// derived from the call's arguments (by default) or a caller-supplied
/// extractor, and published.
///
/// The function's return value is never altered; emission happens as a
/// side effect after the original body completes.
pub fn expand(args: EmitArgs, item: ItemFn) -> syn::Result<TokenStream> {
    if item.sig.asyncness.is_none() {
        return Err(syn::Error::new_spanned(
            &item.sig.fn_token,
            "`emit_on_success` only supports `async fn`; for synchronous callers use \
             `eventflow_runtime::emission::emit_on_success_blocking` directly",
        ));
    }

    let ItemFn {
        attrs,
        vis,
        sig,
        block,
    } = item;

    let event_type = &args.event_type;
    let fn_name = sig.ident.to_string();

    let source_expr = match &args.source {
        Some(source) => quote! { ::std::option::Option::Some(#source) },
        None => quote! { ::std::option::Option::None },
    };

    let condition_check = match &args.condition {
        Some(path) => quote! { #path(__eventflow_value) },
        None => quote! { true },
    };

    let data_extractor_expr = match &args.data_extractor {
        Some(path) => quote! { ::std::option::Option::Some(#path as ::eventflow_runtime::emission::Extractor<_>) },
        None => quote! { ::std::option::Option::None },
    };

    let metadata_extractor_expr = match &args.metadata_extractor {
        Some(path) => quote! { ::std::option::Option::Some(#path as ::eventflow_runtime::emission::Extractor<_>) },
        None => quote! { ::std::option::Option::None },
    };

    // Snapshot every simple-ident, non-receiver argument before the body
    // runs, so default extraction can scan call arguments rather than only
    // the return value; arguments the body moves are captured by reference
    // first.
    let arg_captures: Vec<TokenStream> = sig
        .inputs
        .iter()
        .filter_map(|arg| match arg {
            FnArg::Typed(pat_type) => match &*pat_type.pat {
                Pat::Ident(pat_ident) => {
                    let ident = &pat_ident.ident;
                    let name = ident.to_string();
                    Some(quote! {
                        __eventflow_args.insert(#name, ::serde_json::to_value(&#ident).unwrap_or(::serde_json::Value::Null));
                    })
                }
                _ => None,
            },
            FnArg::Receiver(_) => None,
        })
        .collect();

    let expanded = quote! {
        #(#attrs)* #vis #sig {
            let mut __eventflow_args = ::eventflow_runtime::emission::CallArgs::new();
            #(#arg_captures)*

            let __eventflow_result = (async move #block).await;

            if let ::std::result::Result::Ok(__eventflow_value) = &__eventflow_result {
                if #condition_check {
                    ::eventflow_runtime::emission::emit_on_success(
                        #event_type,
                        &__eventflow_args,
                        __eventflow_value,
                        module_path!(),
                        #fn_name,
                        #source_expr,
                        #data_extractor_expr,
                        #metadata_extractor_expr,
                    )
                    .await;
                }
            }

            __eventflow_result
        }
    };

    Ok(expanded)
}
