use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{Data, DeriveInput, Index, Member, parse_macro_input};

pub fn derive_event(input: TokenStream) -> TokenStream {
    // Parse the input tokens into a syntax tree
    let ast = parse_macro_input!(input as DeriveInput);

    match expand(&ast) {
        Ok(tokens) => tokens.into(),
        Err(error) => error.to_compile_error().into(),
    }
}

fn expand(ast: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &ast.ident;
    let (impl_generics, ty_generics, where_clause) = ast.generics.split_for_impl();

    if let Some(attr) = ast.attrs.iter().find(|attr| attr.path().is_ident("event")) {
        return Err(syn::Error::new_spanned(
            attr,
            "#[event(parent)] belongs on a field, not on the type",
        ));
    }

    // Use ::rusty_broker::Event which works both inside and outside the crate.
    // Inside the crate, this works because of `extern crate self as rusty_broker;` in lib.rs
    let parent = parent_field(ast)?.map(|member| {
        quote! {
            fn parent(&self) -> ::core::option::Option<&dyn ::rusty_broker::Event> {
                ::core::option::Option::Some(&self.#member)
            }
        }
    });

    Ok(quote! {
        impl #impl_generics ::rusty_broker::Event for #name #ty_generics #where_clause {
            #parent
        }
    })
}

/// Finds the single field tagged `#[event(parent)]`, if any.
fn parent_field(ast: &DeriveInput) -> syn::Result<Option<Member>> {
    let fields = match &ast.data {
        Data::Struct(data) => &data.fields,
        Data::Enum(data) => {
            for field in data.variants.iter().flat_map(|variant| variant.fields.iter()) {
                if let Some(attr) = field.attrs.iter().find(|attr| attr.path().is_ident("event")) {
                    return Err(syn::Error::new_spanned(
                        attr,
                        "#[event(parent)] is only supported on struct fields",
                    ));
                }
            }
            return Ok(None);
        }
        Data::Union(data) => {
            return Err(syn::Error::new_spanned(
                data.union_token,
                "Event cannot be derived for unions",
            ));
        }
    };

    let mut parent = None;
    for (index, field) in fields.iter().enumerate() {
        for attr in field.attrs.iter().filter(|attr| attr.path().is_ident("event")) {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("parent") {
                    Ok(())
                } else {
                    Err(meta.error("unsupported event attribute, expected `parent`"))
                }
            })?;

            if parent.is_some() {
                return Err(syn::Error::new_spanned(
                    attr,
                    "only one field can be marked #[event(parent)]",
                ));
            }
            parent = Some(match &field.ident {
                Some(ident) => Member::Named(ident.clone()),
                None => Member::Unnamed(Index::from(index)),
            });
        }
    }

    Ok(parent)
}
