//! Procedural macros for the docbind project.
//!
//! Provides `#[derive(Document)]`, which implements the `Document` trait for
//! a struct with named fields:
//!
//! ```ignore
//! use docbind::Document;
//! use bson::Uuid;
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize, Document)]
//! #[document(collection = "users")]
//! pub struct User {
//!     pub id: Uuid,
//!     pub name: String,
//! }
//! ```
//!
//! The id field is the field named `id`, or any field marked
//! `#[document(id)]`. The `collection` attribute is required. The derive
//! leaves `Document::schema` at its empty default; types that declare schema
//! effects implement the trait by hand instead.

#[allow(unused_extern_crates)]
extern crate self as docbind_macros;

use proc_macro::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Fields, Ident, LitStr, parse_macro_input};

#[proc_macro_derive(Document, attributes(document))]
pub fn derive_document(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match expand_document(&input) {
        Ok(tokens) => tokens,
        Err(error) => error.to_compile_error().into(),
    }
}

fn expand_document(input: &DeriveInput) -> syn::Result<TokenStream> {
    let name = &input.ident;
    let collection = collection_attribute(input)?;
    let id_field = id_field(input)?;

    Ok(quote! {
        impl ::docbind::document::Document for #name {
            fn id(&self) -> &::docbind::bson::Uuid {
                &self.#id_field
            }

            fn collection_name() -> &'static str {
                #collection
            }
        }
    }
    .into())
}

fn collection_attribute(input: &DeriveInput) -> syn::Result<LitStr> {
    let mut collection: Option<LitStr> = None;

    for attr in &input.attrs {
        if !attr.path().is_ident("document") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("collection") {
                collection = Some(meta.value()?.parse()?);
                return Ok(());
            }

            Err(meta.error("unsupported document attribute"))
        })?;
    }

    collection.ok_or_else(|| {
        syn::Error::new_spanned(
            &input.ident,
            "#[derive(Document)] requires #[document(collection = \"...\")]",
        )
    })
}

fn id_field(input: &DeriveInput) -> syn::Result<Ident> {
    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => &named.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    &input.ident,
                    "#[derive(Document)] requires named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &input.ident,
                "#[derive(Document)] can only be derived for structs",
            ));
        }
    };

    // An explicit #[document(id)] marker wins over the `id` naming
    // convention.
    let mut marked: Option<Ident> = None;
    for field in fields {
        for attr in &field.attrs {
            if !attr.path().is_ident("document") {
                continue;
            }

            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("id") {
                    marked = field.ident.clone();
                    return Ok(());
                }

                Err(meta.error("unsupported document field attribute"))
            })?;
        }
    }

    if let Some(ident) = marked {
        return Ok(ident);
    }

    fields
        .iter()
        .filter_map(|field| field.ident.clone())
        .find(|ident| ident == "id")
        .ok_or_else(|| {
            syn::Error::new_spanned(
                &input.ident,
                "#[derive(Document)] needs a field named `id` or one marked #[document(id)]",
            )
        })
}
