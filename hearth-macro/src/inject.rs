use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Field, Fields, LitStr, Type};

pub fn derive_inject(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    let expanded = generate_inject_impl(&input);
    TokenStream::from(expanded)
}

/// Per-field wiring derived from the `#[resolve]` / `#[config]` attributes.
enum Wiring {
    Resolve { name: String },
    Config { key: String, default: Option<String> },
    Untouched,
}

fn generate_inject_impl(input: &DeriveInput) -> TokenStream2 {
    let struct_name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => panic!("#[derive(Inject)] only supports structs with named fields"),
        },
        _ => panic!("#[derive(Inject)] can only be applied to structs"),
    };

    let field_inits = fields.iter().map(|field| {
        let field_name = &field.ident;
        let field_str = field_name
            .as_ref()
            .map(|ident| ident.to_string())
            .unwrap_or_default();

        match field_wiring(field) {
            Wiring::Resolve { name } => {
                // Arc<T> fields take the shared handle; anything else gets a
                // clone of the stored value and must therefore be Clone.
                if let Some(inner) = arc_inner_type(&field.ty) {
                    quote! {
                        #field_name: ::hearth::inject::resolve_field::<#inner>(
                            #name, owner, #field_str,
                        )?
                    }
                } else {
                    let ty = &field.ty;
                    quote! {
                        #field_name: ::hearth::inject::resolve_field::<#ty>(
                            #name, owner, #field_str,
                        )?
                        .as_ref()
                        .clone()
                    }
                }
            }
            Wiring::Config { key, default } => {
                let ty = &field.ty;
                let default_tokens = match default {
                    Some(d) => quote!(::core::option::Option::Some(#d)),
                    None => quote!(::core::option::Option::None),
                };
                quote! {
                    #field_name: ::hearth::inject::config_field::<#ty>(
                        scope, #key, #default_tokens, owner, #field_str,
                    )?
                }
            }
            Wiring::Untouched => quote! {
                #field_name: ::core::default::Default::default()
            },
        }
    });

    quote! {
        #[automatically_derived]
        impl #impl_generics ::hearth::inject::Inject for #struct_name #ty_generics #where_clause {
            #[allow(unused_variables)]
            fn inject(scope: &::hearth::scope::Scope) -> ::hearth::error::Result<Self> {
                let owner = ::hearth::component::short_type_name::<Self>();
                ::core::result::Result::Ok(Self {
                    #(#field_inits),*
                })
            }
        }
    }
}

fn field_wiring(field: &Field) -> Wiring {
    for attr in &field.attrs {
        if attr.path().is_ident("resolve") {
            let mut name = String::new();
            if !matches!(attr.meta, syn::Meta::Path(_)) {
                attr.parse_nested_meta(|meta| {
                    if meta.path.is_ident("name") {
                        let lit: LitStr = meta.value()?.parse()?;
                        name = lit.value();
                        Ok(())
                    } else {
                        Err(meta.error("expected `name = \"...\"`"))
                    }
                })
                .unwrap_or_else(|e| panic!("invalid #[resolve] attribute: {}", e));
            }
            return Wiring::Resolve { name };
        }
        if attr.path().is_ident("config") {
            let mut key: Option<String> = None;
            let mut default: Option<String> = None;
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("key") {
                    let lit: LitStr = meta.value()?.parse()?;
                    key = Some(lit.value());
                    Ok(())
                } else if meta.path.is_ident("default") {
                    let lit: LitStr = meta.value()?.parse()?;
                    default = Some(lit.value());
                    Ok(())
                } else {
                    Err(meta.error("expected `key = \"...\"` or `default = \"...\"`"))
                }
            })
            .unwrap_or_else(|e| panic!("invalid #[config] attribute: {}", e));

            let key = key
                .unwrap_or_else(|| panic!("#[config] requires a `key = \"...\"` argument"));
            return Wiring::Config { key, default };
        }
    }
    Wiring::Untouched
}

/// Extract the inner type from `Arc<T>`, if the field is Arc-shaped.
fn arc_inner_type(ty: &Type) -> Option<Type> {
    if let Type::Path(type_path) = ty {
        if let Some(segment) = type_path.path.segments.last() {
            if segment.ident == "Arc" {
                if let syn::PathArguments::AngleBracketed(args) = &segment.arguments {
                    if let Some(syn::GenericArgument::Type(inner)) = args.args.first() {
                        return Some(inner.clone());
                    }
                }
            }
        }
    }
    None
}
