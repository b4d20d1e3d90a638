use crate::attr::parse_optional_str;
use crate::derive_utils::apply_derives;
use proc_macro::TokenStream;
use quote::quote;
use syn::parse::Parser;
use syn::spanned::Spanned;
use syn::{Item, parse_macro_input};

// 通用分组的序列化前缀，具名分组不得占用
const GENERIC_GROUP_PREFIX: &str = "GenericGroup-";

pub(crate) fn expand(attr: TokenStream, item: TokenStream) -> TokenStream {
    let name = match (|input: syn::parse::ParseStream| parse_optional_str(input, "name")).parse(attr)
    {
        Ok(name) => name,
        Err(err) => return err.to_compile_error().into(),
    };
    let input = parse_macro_input!(item as Item);

    let mut st = match input {
        Item::Struct(s) => s,
        other => {
            return syn::Error::new(other.span(), "#[group] only on struct")
                .to_compile_error()
                .into();
        }
    };

    if !matches!(st.fields, syn::Fields::Unit) {
        return syn::Error::new(st.fields.span(), "#[group] supports only unit struct, e.g., struct X;")
            .to_compile_error()
            .into();
    }

    if let Some(name) = &name {
        let value = name.value();
        if value.is_empty() || value.starts_with(GENERIC_GROUP_PREFIX) {
            return syn::Error::new(
                name.span(),
                format!("group name must be non-empty and must not start with '{GENERIC_GROUP_PREFIX}'"),
            )
            .to_compile_error()
            .into();
        }
    }

    let required: Vec<syn::Path> = vec![
        syn::parse_quote!(Debug),
        syn::parse_quote!(Clone),
        syn::parse_quote!(Copy),
        syn::parse_quote!(Default),
        syn::parse_quote!(PartialEq),
        syn::parse_quote!(Eq),
        syn::parse_quote!(Hash),
    ];
    apply_derives(&mut st.attrs, required);

    let ident = &st.ident;
    let name_expr = match name {
        Some(name) => quote! { #name },
        None => quote! { ::core::concat!(::core::module_path!(), "::", ::core::stringify!(#ident)) },
    };

    let out = quote! {
        #st

        impl ::mailbus::group::GroupType for #ident {
            const NAME: &'static str = #name_expr;
        }
    };
    out.into()
}
