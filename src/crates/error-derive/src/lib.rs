//! # 错误派生宏
//!
//! 提供 `#[derive(Error)]`，为错误枚举生成 `Display`、`error::ErrorKind`、
//! `std::error::Error` 以及到 `error::ErrorInfo` 的转换。
//!
//! ## 使用方法
//!
//! ```rust,ignore
//! use error::Error;
//!
//! #[derive(Debug, Error)]
//! enum StorageError {
//!     #[error("证书编码无效: {0}", code = 6201, category = Parse, severity = Warning)]
//!     InvalidCertificate(String),
//!
//!     #[error("记录第 {line} 行格式错误: {msg}", code = 6501, category = Parse)]
//!     MalformedRecord { line: usize, msg: String },
//!
//!     #[error("存储已因先前的写入失败被锁定", code = 6302, category = Durability, severity = Critical)]
//!     RestartRequired,
//! }
//! ```
//!
//! ## 属性参数
//!
//! - 第一个参数是错误消息，支持 `{0}`、`{field}` 占位符（可带格式说明，如 `{0:?}`）
//! - `code = N` 错误码，缺省时按变体顺序从 1 开始编号
//! - `category = X` 对应 `error::ErrorCategory::X`，缺省为 `Other`
//! - `severity = Y` 对应 `error::ErrorSeverity::Y`，缺省为 `Error`

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::parse::{Parse, ParseStream};
use syn::{parse_macro_input, Data, DeriveInput, Fields, Ident, LitInt, LitStr, Token, Variant};

/// `#[error(...)]` 属性的解析结果
struct ErrorAttr {
    message: LitStr,
    code: Option<LitInt>,
    category: Option<Ident>,
    severity: Option<Ident>,
}

impl Parse for ErrorAttr {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let message: LitStr = input.parse()?;
        let mut code = None;
        let mut category = None;
        let mut severity = None;

        while input.peek(Token![,]) {
            input.parse::<Token![,]>()?;
            if input.is_empty() {
                break;
            }
            let key: Ident = input.parse()?;
            input.parse::<Token![=]>()?;
            match key.to_string().as_str() {
                "code" => code = Some(input.parse::<LitInt>()?),
                "category" => category = Some(input.parse::<Ident>()?),
                "severity" => severity = Some(input.parse::<Ident>()?),
                other => {
                    return Err(syn::Error::new(
                        key.span(),
                        format!("未知的 error 参数: {}", other),
                    ))
                }
            }
        }

        Ok(Self { message, code, category, severity })
    }
}

/// Error 派生宏
#[proc_macro_derive(Error, attributes(error))]
pub fn derive_error(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let variants = match &input.data {
        Data::Enum(data) => &data.variants,
        _ => {
            return Err(syn::Error::new_spanned(input, "Error 派生宏只能用于枚举类型"));
        }
    };

    let mut display_arms = Vec::new();
    let mut code_arms = Vec::new();
    let mut category_arms = Vec::new();
    let mut severity_arms = Vec::new();

    for (idx, variant) in variants.iter().enumerate() {
        let attr = find_error_attr(variant)?;
        let pattern = wildcard_pattern(variant);

        display_arms.push(display_arm(variant, attr.as_ref()));

        let code = match attr.as_ref().and_then(|a| a.code.as_ref()) {
            Some(lit) => quote! { #lit },
            None => {
                // 未声明时按变体顺序从1开始编号
                let code = idx as u32 + 1;
                quote! { #code }
            }
        };
        code_arms.push(quote! { #pattern => #code });

        let category = attr
            .as_ref()
            .and_then(|a| a.category.clone())
            .unwrap_or_else(|| format_ident!("Other"));
        category_arms.push(quote! { #pattern => ::error::ErrorCategory::#category });

        let severity = attr
            .as_ref()
            .and_then(|a| a.severity.clone())
            .unwrap_or_else(|| format_ident!("Error"));
        severity_arms.push(quote! { #pattern => ::error::ErrorSeverity::#severity });
    }

    Ok(quote! {
        impl #impl_generics ::std::fmt::Display for #name #ty_generics #where_clause {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                match self {
                    #(#display_arms,)*
                }
            }
        }

        impl #impl_generics ::error::ErrorKind for #name #ty_generics #where_clause {
            fn error_code(&self) -> u32 {
                match self {
                    #(#code_arms,)*
                }
            }

            fn error_message(&self) -> ::std::string::String {
                ::std::string::ToString::to_string(self)
            }

            fn category(&self) -> ::error::ErrorCategory {
                match self {
                    #(#category_arms,)*
                }
            }

            fn severity(&self) -> ::error::ErrorSeverity {
                match self {
                    #(#severity_arms,)*
                }
            }
        }

        impl #impl_generics ::std::error::Error for #name #ty_generics #where_clause {}

        impl #impl_generics ::std::convert::From<#name #ty_generics> for ::error::ErrorInfo #where_clause {
            fn from(err: #name #ty_generics) -> Self {
                let code = ::error::ErrorKind::error_code(&err);
                let category = ::error::ErrorKind::category(&err);
                let severity = ::error::ErrorKind::severity(&err);
                ::error::ErrorInfo::new(code, ::std::string::ToString::to_string(&err))
                    .with_category(category)
                    .with_severity(severity)
            }
        }
    })
}

fn find_error_attr(variant: &Variant) -> syn::Result<Option<ErrorAttr>> {
    for attr in &variant.attrs {
        if attr.path().is_ident("error") {
            return attr.parse_args::<ErrorAttr>().map(Some);
        }
    }
    Ok(None)
}

/// 忽略所有字段的匹配模式
fn wildcard_pattern(variant: &Variant) -> TokenStream2 {
    let variant_name = &variant.ident;
    match &variant.fields {
        Fields::Named(_) => quote! { Self::#variant_name { .. } },
        Fields::Unnamed(_) => quote! { Self::#variant_name(..) },
        Fields::Unit => quote! { Self::#variant_name },
    }
}

/// 判断格式字符串是否引用了某个参数（`{name}` 或 `{name:...}`）
fn references(format_str: &str, name: &str) -> bool {
    format_str.contains(&format!("{{{}}}", name)) || format_str.contains(&format!("{{{}:", name))
}

fn display_arm(variant: &Variant, attr: Option<&ErrorAttr>) -> TokenStream2 {
    let variant_name = &variant.ident;
    let (message, span) = match attr {
        Some(a) => (a.message.value(), a.message.span()),
        None => (format!("错误: {}", variant_name), proc_macro2::Span::call_site()),
    };

    match &variant.fields {
        Fields::Named(fields) => {
            let used: Vec<&Ident> = fields
                .named
                .iter()
                .filter_map(|f| f.ident.as_ref())
                .filter(|ident| references(&message, &ident.to_string()))
                .collect();
            let format_lit = LitStr::new(&message, span);
            let values = used.clone();

            if used.is_empty() {
                quote! { Self::#variant_name { .. } => write!(f, #format_lit) }
            } else {
                quote! {
                    Self::#variant_name { #(#used,)* .. } => {
                        write!(f, #format_lit, #(#used = #values),*)
                    }
                }
            }
        }
        Fields::Unnamed(fields) => {
            let mut format_str = message.clone();
            let mut bindings = Vec::new();
            let mut used = Vec::new();

            for i in 0..fields.unnamed.len() {
                let binding = format_ident!("_field{}", i);
                let position = i.to_string();
                if references(&message, &position) {
                    format_str = format_str
                        .replace(&format!("{{{}}}", position), &format!("{{{}}}", binding))
                        .replace(&format!("{{{}:", position), &format!("{{{}:", binding));
                    used.push(binding.clone());
                    bindings.push(quote! { #binding });
                } else {
                    bindings.push(quote! { _ });
                }
            }
            let format_lit = LitStr::new(&format_str, span);
            let values = used.clone();

            if used.is_empty() {
                quote! { Self::#variant_name(..) => write!(f, #format_lit) }
            } else {
                quote! {
                    Self::#variant_name(#(#bindings),*) => {
                        write!(f, #format_lit, #(#used = #values),*)
                    }
                }
            }
        }
        Fields::Unit => {
            let format_lit = LitStr::new(&message, span);
            quote! { Self::#variant_name => write!(f, #format_lit) }
        }
    }
}
