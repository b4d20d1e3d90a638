use crate::attr::parse_optional_str;
use crate::derive_utils::apply_derives;
use proc_macro::TokenStream;
use quote::{format_ident, quote};
use syn::parse::Parser;
use syn::spanned::Spanned;
use syn::{Item, LitStr, parse_macro_input};

pub(crate) fn expand(attr: TokenStream, item: TokenStream) -> TokenStream {
    let key_type =
        match (|input: syn::parse::ParseStream| parse_optional_str(input, "key_type")).parse(attr) {
            Ok(key_type) => key_type,
            Err(err) => return err.to_compile_error().into(),
        };
    let input = parse_macro_input!(item as Item);

    let mut st = match input {
        Item::Struct(s) => s,
        other => {
            return syn::Error::new(other.span(), "#[registration_key] only on struct")
                .to_compile_error()
                .into();
        }
    };

    let inner_ty = match &st.fields {
        syn::Fields::Unnamed(f) if f.unnamed.len() == 1 => f.unnamed[0].ty.clone(),
        _ => {
            return syn::Error::new(
                st.span(),
                "#[registration_key] requires a tuple struct with exactly one field",
            )
            .to_compile_error()
            .into();
        }
    };

    if !st.generics.params.is_empty() {
        return syn::Error::new(
            st.generics.span(),
            "#[registration_key] does not support generic structs",
        )
        .to_compile_error()
        .into();
    }

    let required: Vec<syn::Path> = vec![
        syn::parse_quote!(Debug),
        syn::parse_quote!(Clone),
        syn::parse_quote!(PartialEq),
        syn::parse_quote!(Eq),
        syn::parse_quote!(Hash),
    ];
    apply_derives(&mut st.attrs, required);

    let ident = &st.ident;
    let vis = &st.vis;
    let factory = format_ident!("{}Factory", ident);
    let key_type = key_type.unwrap_or_else(|| LitStr::new(&ident.to_string(), ident.span()));

    let out = quote! {
        #st

        impl #ident {
            pub fn new(value: #inner_ty) -> Self { Self(value) }

            pub fn value(&self) -> &#inner_ty { &self.0 }
        }

        impl ::mailbus::key::RegistrationKey for #ident {
            fn key_type(&self) -> &'static str { #key_type }

            fn as_string(&self) -> ::std::string::String { ::std::string::ToString::to_string(&self.0) }
        }

        impl ::mailbus::key::KeyType for #ident {
            const KEY_TYPE: &'static str = #key_type;

            fn factory() -> ::std::sync::Arc<dyn ::mailbus::key::KeyFactory> {
                ::std::sync::Arc::new(#factory)
            }
        }

        #[doc = "解析该注册键字符串形式的工厂"]
        #[derive(Debug, Clone, Copy, Default)]
        #vis struct #factory;

        impl ::mailbus::key::KeyFactory for #factory {
            fn key_type(&self) -> &'static str { #key_type }

            fn from_string(
                &self,
                value: &str,
            ) -> ::mailbus::error::EventBusResult<::std::sync::Arc<dyn ::mailbus::key::RegistrationKey>> {
                let inner = <#inner_ty as ::std::str::FromStr>::from_str(value).map_err(|err| {
                    ::mailbus::error::EventBusError::InvalidRegistrationKey {
                        value: ::std::string::ToString::to_string(value),
                        reason: ::std::string::ToString::to_string(&err),
                    }
                })?;
                ::std::result::Result::Ok(::std::sync::Arc::new(#ident(inner)))
            }
        }
    };
    out.into()
}
