use std::str::FromStr;

use proc_macro::TokenStream;
use quote::{quote, quote_spanned};
use syn::{
    punctuated::Punctuated, spanned::Spanned, token::{self, Pound}, Attribute, Ident, Item, Meta,
};

static GPU_TYPES: &str = "CUDA";

fn inline_attr(always: bool, with_span: impl Spanned) -> Attribute {
    let mut inner_meta = "inline";
    if always {
        inner_meta = "inline(always)"
    }
    let meta: Meta = syn::parse_str(inner_meta).expect("Can't parse `inner_meta`");
    let span = with_span.span();
    Attribute {
        pound_token: Pound(span),
        style: syn::AttrStyle::Outer,
        bracket_token: token::Bracket(span),
        meta,
    }
}

struct ProcMacFailure(TokenStream);

impl From<TokenStream> for ProcMacFailure {
    fn from(value: TokenStream) -> Self {
        Self(value)
    }
}

impl From<syn::Error> for ProcMacFailure {
    fn from(value: syn::Error) -> Self {
        Self(value.to_compile_error().into())
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum TargetType {
    CUDA,
}

impl TargetType {
    fn target_arch(&self) -> &'static str {
        match self {
            Self::CUDA => "nvptx64",
        }
    }

    fn to_many_arch_cfg<'a>(arch_types: impl Iterator<Item = &'a Self>, for_span: impl Spanned) -> Attribute {
        let mut any_str = arch_types.fold(String::from("cfg(any("), |mut acc, curr| {
            acc.push_str(&format!(r#"target_arch = "{}","#, curr.target_arch()));
            acc
        });
        any_str.pop();
        any_str.push_str("))");

        let attr_meta = syn::parse_str(&any_str).expect("Should be able to parse, even for multiple architectures.");

        Attribute {
            pound_token: Pound(for_span.span()),
            style: syn::AttrStyle::Outer,
            bracket_token: token::Bracket(for_span.span()),
            meta: attr_meta,
        }
    }
}

impl FromStr for TargetType {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CUDA" => Ok(Self::CUDA),
            _ => Err(()),
        }
    }
}

fn get_architectures<'a>(
    target_ids: impl Iterator<Item = &'a Ident>,
) -> Result<Vec<TargetType>, TokenStream> {
    let mut archs = vec![];

    for target in target_ids {
        let target_type = TargetType::from_str(target.to_string().as_str()).map_err(|_| {
            quote_spanned! {target.span()=>
                compile_error!(concat!("Unsupported GPU target! Use ", #GPU_TYPES));
            }
        })?;
        archs.push(target_type);
    }

    Ok(archs)
}

/// Device functions are called across crates from kernel bodies; without
/// inlining, every scratch handle and lane id goes through the stack.
fn force_inline(item: &mut Item) {
    if let Item::Fn(item_fn) = item {
        let already_inline = item_fn.attrs.iter().any(|a| a.path().is_ident("inline"));
        if !already_inline {
            item_fn.attrs.push(inline_attr(true, item_fn.sig.ident.span()));
        }
    }
}

fn device_inner(attr: TokenStream, item: TokenStream) -> Result<TokenStream, ProcMacFailure> {
    let mut item: Item = syn::parse(item)?;

    let arch_types_ids = syn::parse::Parser::parse(
        Punctuated::<Ident, syn::Token![,]>::parse_terminated,
        attr,
    )
    .map_err(|_| {
        TokenStream::from(quote! {
            compile_error!(concat!("`device` takes either no arguments or ", #GPU_TYPES));
        })
    })?;
    let mut arch_types = get_architectures(arch_types_ids.iter())?;
    if arch_types.is_empty() {
        arch_types.push(TargetType::CUDA);
    }

    force_inline(&mut item);
    let gate = TargetType::to_many_arch_cfg(arch_types.iter(), arch_types_ids.span());
    Ok(quote! {
        #gate
        #item
    }
    .into())
}

/// Keeps an item out of device builds.
#[proc_macro_attribute]
pub fn host(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let item = syn::parse_macro_input!(item as Item);

    let output = quote! {
        #[cfg(not(any(target_arch = "nvptx64")))]
        #item
    };

    output.into()
}

/// Keeps an item out of host builds. Functions are also marked
/// `#[inline(always)]` unless they carry their own `#[inline]`.
///
/// `#[device]` targets every supported device; `#[device(CUDA)]` names them.
#[proc_macro_attribute]
pub fn device(attr: TokenStream, item: TokenStream) -> TokenStream {
    match device_inner(attr, item) {
        Ok(v) | Err(ProcMacFailure(v)) => v,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn only_cuda_parses() {
        assert!(matches!(TargetType::from_str("CUDA"), Ok(TargetType::CUDA)));
        assert_eq!(TargetType::CUDA.target_arch(), "nvptx64");
        for other in ["HIP", "OneAPI", "cuda", ""] {
            assert!(TargetType::from_str(other).is_err(), "{other}");
        }
    }
}
