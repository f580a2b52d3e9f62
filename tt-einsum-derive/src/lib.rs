//! proc-macro declaring tt-einsum at compile time

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use proc_macro_error::{abort, abort_call_site, proc_macro_error};
use quote::quote;
use syn::parse::Parser;
use tt_einsum::TtEinsum;

/// Parse and validate tt-einsum literal at compile time
///
/// ```
/// use tt_einsum::{EinsumKind, TtEinsum};
/// use tt_einsum_derive::tt_einsum;
///
/// let multiply: TtEinsum = tt_einsum!("independent: a i b, c i d -> ac i bd");
/// assert_eq!(multiply.kind(), EinsumKind::Independent);
/// assert_eq!(multiply.to_vanilla(), "...aib,...cid->...acibd");
/// ```
///
/// This expands into the code constructing the [TtEinsum] directly,
/// and the literal is never parsed at runtime.
///
/// Examples
/// ---------
///
/// - Inner product regarded as flat vectors
///
///   ```
///   use tt_einsum_derive::tt_einsum;
///
///   let flat_inner = tt_einsum!("running: a i b, c i d, a c -> b d");
///   assert_eq!(flat_inner.num_operands(), 2);
///   ```
///
/// - If the result uses a label which does not appear in arguments,
///   this raises compile error:
///
///   ```compile_fail
///   use tt_einsum_derive::tt_einsum;
///
///   let multiply = tt_einsum!("independent: a i b, c i d -> ac i bz");
///   ```
///
#[proc_macro_error]
#[proc_macro]
pub fn tt_einsum(input: TokenStream) -> TokenStream {
    tt_einsum2(input.into()).into()
}

fn tt_einsum2(input: TokenStream2) -> TokenStream2 {
    let (literal, span) = parse(input);
    let einsum: TtEinsum = match literal.parse() {
        Ok(einsum) => einsum,
        Err(e) => abort!(span, "Invalid tt-einsum: {}", e),
    };
    quote! { #einsum }
}

fn parse(input: TokenStream2) -> (String, proc_macro2::Span) {
    let parser = syn::punctuated::Punctuated::<syn::Expr, syn::Token![,]>::parse_terminated;
    let args = match parser.parse2(input) {
        Ok(args) => args,
        Err(e) => abort!(e.span(), "Invalid input for tt_einsum!"),
    };
    let mut iter = args.into_iter();
    let literal = if let Some(syn::Expr::Lit(syn::ExprLit {
        lit: syn::Lit::Str(lit),
        attrs: _,
    })) = iter.next()
    {
        lit
    } else {
        abort_call_site!("tt_einsum! takes a tt-einsum string literal")
    };
    if iter.next().is_some() {
        abort_call_site!("tt_einsum! takes only one string literal");
    }
    (literal.value(), literal.span())
}
