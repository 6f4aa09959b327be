//! Derive macro for the `Describe` trait.

use proc_macro2::TokenStream;
use quote::{quote, quote_spanned};
use syn::{
    parse_macro_input, parse_quote, spanned::Spanned, Attribute, Data, DeriveInput, Fields,
    GenericArgument, Index, LitStr, Member, Path, PathArguments, Type,
};

/// Container options from `#[gc(...)]`.
struct Options {
    krate: Path,
    name: Option<LitStr>,
}

impl Options {
    fn from_attrs(attrs: &[Attribute]) -> syn::Result<Self> {
        let mut options = Self {
            krate: parse_quote!(::arena_gc),
            name: None,
        };
        for attr in attrs {
            if !attr.path().is_ident("gc") {
                continue;
            }
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("crate") {
                    options.krate = meta.value()?.parse()?;
                    Ok(())
                } else if meta.path.is_ident("name") {
                    options.name = Some(meta.value()?.parse()?);
                    Ok(())
                } else {
                    Err(meta.error("unsupported attribute"))
                }
            })?;
        }
        Ok(options)
    }
}

/// Derive `Describe` for a `#[repr(C)]` struct.
///
/// The struct describes the payload that follows the 16-byte object
/// header; the generated descriptor's size and pointer offsets include the
/// header.
#[proc_macro_derive(Describe, attributes(gc))]
pub fn derive_describe(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream> {
    let options = Options::from_attrs(&input.attrs)?;

    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "`Describe` cannot be derived for generic types",
        ));
    }
    if !has_repr_c(&input.attrs)? {
        return Err(syn::Error::new_spanned(
            &input.ident,
            "`Describe` requires `#[repr(C)]`",
        ));
    }

    let fields = match &input.data {
        Data::Struct(data) => &data.fields,
        Data::Enum(data) => {
            return Err(syn::Error::new_spanned(
                data.enum_token,
                "`Describe` can only be derived for structs",
            ))
        }
        Data::Union(data) => {
            return Err(syn::Error::new_spanned(
                data.union_token,
                "`Describe` can only be derived for structs",
            ))
        }
    };

    let krate = &options.krate;
    let ident = &input.ident;
    let name = options
        .name
        .unwrap_or_else(|| LitStr::new(&ident.to_string(), ident.span()));

    let mut offsets = Vec::new();
    let mut size_checks = Vec::new();
    for (i, field) in fields.iter().enumerate() {
        if !is_pointer_field(field)? {
            continue;
        }
        let member = field.ident.clone().map_or_else(
            || Member::Unnamed(Index::from(i)),
            Member::Named,
        );
        let ty = &field.ty;
        offsets.push(quote_spanned! {field.span() =>
            #krate::HEADER_SIZE + ::core::mem::offset_of!(#ident, #member)
        });
        size_checks.push(quote_spanned! {ty.span() =>
            const _: () = ::core::assert!(
                ::core::mem::size_of::<#ty>() == ::core::mem::size_of::<usize>(),
                "pointer fields must be pointer-sized",
            );
        });
    }
    let count = offsets.len();

    Ok(quote! {
        impl #krate::Describe for #ident {
            fn descriptor() -> &'static #krate::TypeDescriptor {
                #(#size_checks)*
                static POINTER_OFFSETS: [usize; #count] = [#(#offsets),*];
                static DESCRIPTOR: #krate::TypeDescriptor = #krate::TypeDescriptor::fixed(
                    #name,
                    #krate::HEADER_SIZE + ::core::mem::size_of::<#ident>(),
                    &POINTER_OFFSETS,
                );
                &DESCRIPTOR
            }
        }
    })
}

fn has_repr_c(attrs: &[Attribute]) -> syn::Result<bool> {
    let mut found = false;
    for attr in attrs {
        if !attr.path().is_ident("repr") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("C") {
                found = true;
            } else if meta.input.peek(syn::token::Paren) {
                let content;
                syn::parenthesized!(content in meta.input);
                content.parse::<TokenStream>()?;
            }
            Ok(())
        })?;
    }
    Ok(found)
}

fn is_pointer_field(field: &syn::Field) -> syn::Result<bool> {
    let mut forced = false;
    for attr in &field.attrs {
        if !attr.path().is_ident("gc") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("ptr") {
                forced = true;
                Ok(())
            } else {
                Err(meta.error("unsupported field attribute"))
            }
        })?;
    }
    Ok(forced || is_obj_ref(&field.ty) || option_of_obj_ref(&field.ty))
}

fn last_segment(ty: &Type) -> Option<&syn::PathSegment> {
    match ty {
        Type::Path(path) if path.qself.is_none() => path.path.segments.last(),
        _ => None,
    }
}

fn is_obj_ref(ty: &Type) -> bool {
    last_segment(ty)
        .is_some_and(|seg| seg.ident == "ObjRef" && seg.arguments.is_none())
}

fn option_of_obj_ref(ty: &Type) -> bool {
    let Some(seg) = last_segment(ty) else {
        return false;
    };
    if seg.ident != "Option" {
        return false;
    }
    let PathArguments::AngleBracketed(args) = &seg.arguments else {
        return false;
    };
    matches!(
        args.args.first(),
        Some(GenericArgument::Type(inner)) if args.args.len() == 1 && is_obj_ref(inner)
    )
}
