//! Generate Rust code constructing tt-einsum, used by `tt_einsum!` macro

use crate::{
    label::Group,
    tt_einsum::{EinsumKind, TtEinsum, TtEinsumCore},
};
use proc_macro2::TokenStream as TokenStream2;
use quote::{quote, ToTokens, TokenStreamExt};

fn krate() -> syn::Path {
    syn::parse_quote! { ::tt_einsum }
}

impl ToTokens for EinsumKind {
    fn to_tokens(&self, tokens: &mut TokenStream2) {
        let krate = krate();
        let variant = match self {
            EinsumKind::Independent => quote! { Independent },
            EinsumKind::Running => quote! { Running },
        };
        tokens.append_all(quote! { #krate::EinsumKind::#variant });
    }
}

impl ToTokens for Group {
    fn to_tokens(&self, tokens: &mut TokenStream2) {
        let krate = krate();
        let labels = self.labels();
        tokens.append_all(quote! { #krate::Group::new(vec![#(#labels),*]) });
    }
}

impl ToTokens for TtEinsumCore {
    fn to_tokens(&self, tokens: &mut TokenStream2) {
        let krate = krate();
        let groups = self.groups();
        tokens.append_all(quote! { #krate::TtEinsumCore::new(vec![#(#groups),*]) });
    }
}

impl ToTokens for TtEinsum {
    fn to_tokens(&self, tokens: &mut TokenStream2) {
        let krate = krate();
        let kind = self.kind();
        let args = self.args();
        let res = self.res();
        tokens.append_all(quote! {
            #krate::TtEinsum::new_unchecked(#kind, vec![#(#args),*], #res)
        });
    }
}
