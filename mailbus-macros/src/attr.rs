use syn::punctuated::Punctuated;
use syn::{Ident, LitStr, Token, parse::ParseStream};

// 键值参数：<ident> = "<literal>"
struct KvStr {
    key: Ident,
    _eq: Token![=],
    value: LitStr,
}

impl syn::parse::Parse for KvStr {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        Ok(Self {
            key: input.parse()?,
            _eq: input.parse()?,
            value: input.parse()?,
        })
    }
}

/// 解析只接受一个可选字符串参数的属性，如 `name = "..."`
pub(crate) fn parse_optional_str(input: ParseStream, expected: &str) -> syn::Result<Option<LitStr>> {
    if input.is_empty() {
        return Ok(None);
    }

    let pairs: Punctuated<KvStr, Token![,]> = Punctuated::parse_terminated(input)?;
    let mut value: Option<LitStr> = None;
    for kv in pairs.into_iter() {
        if kv.key != expected {
            return Err(syn::Error::new(
                kv.key.span(),
                format!("unknown key in attribute; expected '{expected}'"),
            ));
        }
        if value.is_some() {
            return Err(syn::Error::new(
                kv.key.span(),
                format!("duplicate key '{expected}' in attribute"),
            ));
        }
        value = Some(kv.value);
    }
    Ok(value)
}
