//! Derive macros for bindery function apps.
//!
//! This crate provides `#[derive(Describe)]`, which implements
//! `bindery::Describe` so a command or result type can be registered with a
//! function host without writing its descriptor by hand.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{
    Attribute, Data, DeriveInput, Expr, Fields, Lit, LitStr, Meta, Visibility, parse_macro_input,
};

/// Describes the public shape of a struct or fieldless enum.
///
/// # Container attributes
///
/// - `#[describe(schema_name = "Name")]` overrides the schema key
/// - `#[describe(module = "crate_name")]` overrides the defining crate
/// - `#[describe(contract = "stream")]` declares a capability contract
///   (`single_document`, `document_batch`, `stream`, `validation_result`)
/// - `#[describe(implements = "path::Trait")]` declares any other contract
///
/// # Field attributes
///
/// - `#[describe(rename = "wireName")]`
/// - `#[describe(required)]`
/// - `#[describe(read_only)]`
/// - `#[describe(security)]` binds the field from the caller's security context
/// - `#[describe(skip)]` excludes the field from every schema
///
/// Only `pub` fields are described. Doc comments become descriptions.
///
/// # Example
///
/// ```rust,ignore
/// use bindery::Describe;
///
/// /// Look up one widget.
/// #[derive(Describe)]
/// pub struct GetWidget {
///     pub id: String,
///     #[describe(rename = "expand")]
///     pub expand_children: Option<bool>,
/// }
/// ```
#[proc_macro_derive(Describe, attributes(describe))]
pub fn derive_describe(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

#[derive(Default)]
struct ContainerOptions {
    schema_name: Option<LitStr>,
    module: Option<LitStr>,
    contracts: Vec<TokenStream2>,
}

#[derive(Default)]
struct FieldOptions {
    rename: Option<LitStr>,
    required: bool,
    read_only: bool,
    security: bool,
    skip: bool,
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "generic types cannot be derived; describe each instantiation by hand",
        ));
    }

    let ident = &input.ident;
    let name = ident.to_string();
    let options = container_options(&input.attrs)?;

    let (kind, registrations) = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => {
                let mut properties = Vec::new();
                let mut registrations = Vec::new();
                for field in &fields.named {
                    if !matches!(field.vis, Visibility::Public(_)) {
                        continue;
                    }
                    let field_options = field_options(&field.attrs)?;
                    let Some(field_ident) = &field.ident else {
                        continue;
                    };
                    let ty = &field.ty;
                    let field_name = field_ident.to_string();
                    let field_name = field_name.trim_start_matches("r#");

                    let mut property = quote! {
                        ::bindery::describe::PropertyDescriptor::new(
                            #field_name,
                            <#ty as ::bindery::describe::Describe>::type_ref(),
                        )
                    };
                    if let Some(rename) = &field_options.rename {
                        property = quote! { #property.rename(#rename) };
                    }
                    if field_options.required {
                        property = quote! { #property.required() };
                    }
                    if field_options.read_only {
                        property = quote! { #property.read_only() };
                    }
                    if field_options.security {
                        property = quote! { #property.security() };
                    }
                    if field_options.skip {
                        property = quote! { #property.ignored() };
                    }
                    if let Some(doc) = doc_comment(&field.attrs) {
                        property = quote! { #property.describe(#doc) };
                    }

                    properties.push(property);
                    registrations.push(quote! {
                        <#ty as ::bindery::describe::Describe>::register(catalog);
                    });
                }
                let kind = quote! {
                    ::bindery::describe::TypeDescriptor::object(path)
                        #(.property(#properties))*
                };
                (kind, registrations)
            }
            Fields::Unit => (
                quote! { ::bindery::describe::TypeDescriptor::object(path) },
                Vec::new(),
            ),
            Fields::Unnamed(_) => (
                quote! { ::bindery::describe::TypeDescriptor::opaque(path) },
                Vec::new(),
            ),
        },
        Data::Enum(data) => {
            let mut variants = Vec::new();
            for variant in &data.variants {
                if !matches!(variant.fields, Fields::Unit) {
                    return Err(syn::Error::new_spanned(
                        variant,
                        "only fieldless enums can be described",
                    ));
                }
                variants.push(variant.ident.to_string());
            }
            (
                quote! { ::bindery::describe::TypeDescriptor::enumeration(path, [#(#variants),*]) },
                Vec::new(),
            )
        }
        Data::Union(data) => {
            return Err(syn::Error::new_spanned(
                data.union_token,
                "unions cannot be described",
            ));
        }
    };

    let mut descriptor = kind;
    if !matches!(input.vis, Visibility::Public(_)) {
        descriptor = quote! { #descriptor.restricted() };
    }
    if let Some(module) = &options.module {
        descriptor = quote! { #descriptor.module(#module) };
    }
    if let Some(schema_name) = &options.schema_name {
        descriptor = quote! { #descriptor.schema_name(#schema_name) };
    }
    for contract in &options.contracts {
        descriptor = quote! { #descriptor.implements(#contract) };
    }
    if let Some(doc) = doc_comment(&input.attrs) {
        descriptor = quote! { #descriptor.describe(#doc) };
    }

    Ok(quote! {
        impl ::bindery::describe::Describe for #ident {
            fn type_ref() -> ::bindery::describe::TypeRef {
                ::bindery::describe::TypeRef::named(concat!(module_path!(), "::", #name))
            }

            fn register(catalog: &mut ::bindery::describe::TypeCatalog) {
                let path = concat!(module_path!(), "::", #name);
                if catalog.contains(path) {
                    return;
                }
                catalog.insert(#descriptor);
                #(#registrations)*
            }
        }
    })
}

fn container_options(attrs: &[Attribute]) -> syn::Result<ContainerOptions> {
    let mut options = ContainerOptions::default();
    for attr in attrs.iter().filter(|a| a.path().is_ident("describe")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("schema_name") {
                options.schema_name = Some(meta.value()?.parse()?);
            } else if meta.path.is_ident("module") {
                options.module = Some(meta.value()?.parse()?);
            } else if meta.path.is_ident("contract") {
                let value: LitStr = meta.value()?.parse()?;
                let capability = match value.value().as_str() {
                    "single_document" => quote! { SingleDocument },
                    "document_batch" => quote! { DocumentBatch },
                    "stream" => quote! { Stream },
                    "validation_result" => quote! { ValidationResult },
                    other => {
                        return Err(syn::Error::new_spanned(
                            &value,
                            format!("unknown contract `{other}`"),
                        ));
                    }
                };
                options.contracts.push(quote! {
                    ::bindery::describe::Contract::capability(
                        ::bindery::describe::Capability::#capability,
                    )
                });
            } else if meta.path.is_ident("implements") {
                let value: LitStr = meta.value()?.parse()?;
                let path = value.value();
                let module = path.split("::").next().unwrap_or_default().to_string();
                options.contracts.push(quote! {
                    ::bindery::describe::Contract::new(#path, #module)
                });
            } else {
                return Err(meta.error("unknown describe attribute"));
            }
            Ok(())
        })?;
    }
    Ok(options)
}

fn field_options(attrs: &[Attribute]) -> syn::Result<FieldOptions> {
    let mut options = FieldOptions::default();
    for attr in attrs.iter().filter(|a| a.path().is_ident("describe")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename") {
                options.rename = Some(meta.value()?.parse()?);
            } else if meta.path.is_ident("required") {
                options.required = true;
            } else if meta.path.is_ident("read_only") {
                options.read_only = true;
            } else if meta.path.is_ident("security") {
                options.security = true;
            } else if meta.path.is_ident("skip") {
                options.skip = true;
            } else {
                return Err(meta.error("unknown describe attribute"));
            }
            Ok(())
        })?;
    }
    Ok(options)
}

/// `///` lines joined with spaces.
fn doc_comment(attrs: &[Attribute]) -> Option<String> {
    let lines: Vec<String> = attrs
        .iter()
        .filter(|a| a.path().is_ident("doc"))
        .filter_map(|a| match &a.meta {
            Meta::NameValue(nv) => match &nv.value {
                Expr::Lit(expr) => match &expr.lit {
                    Lit::Str(s) => Some(s.value().trim().to_string()),
                    _ => None,
                },
                _ => None,
            },
            _ => None,
        })
        .filter(|line| !line.is_empty())
        .collect();

    if lines.is_empty() {
        None
    } else {
        Some(lines.join(" "))
    }
}
