//! Derive macros for the sorbus D-Bus library.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::spanned::Spanned;
use syn::{Data, DeriveInput, Fields, Ident};

/// Derives the `Arg` trait.
///
/// Structs with named fields serialize as structs of their fields in
/// declaration order. With `#[arg(dictionary)]` the struct serializes as
/// `a{sv}` instead, keyed by field name; adding `relaxed` makes missing
/// keys fall back to `Default` on read. Fieldless enums with an integer
/// repr serialize as their underlying integer.
#[proc_macro_derive(Arg, attributes(arg))]
pub fn derive_arg(input: TokenStream) -> TokenStream {
    let input = syn::parse_macro_input!(input as DeriveInput);

    expand(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

struct Options {
    dictionary: bool,
    relaxed: bool,
}

fn parse_options(input: &DeriveInput) -> syn::Result<Options> {
    let mut options = Options {
        dictionary: false,
        relaxed: false,
    };

    for attr in &input.attrs {
        if !attr.path().is_ident("arg") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("dictionary") {
                options.dictionary = true;
                return Ok(());
            }

            if meta.path.is_ident("relaxed") {
                options.relaxed = true;
                return Ok(());
            }

            Err(meta.error("expected `dictionary` or `relaxed`"))
        })?;
    }

    if options.relaxed && !options.dictionary {
        return Err(syn::Error::new(
            input.span(),
            "`relaxed` only applies to `dictionary` serialization",
        ));
    }

    Ok(options)
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let options = parse_options(input)?;

    match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => {
                if options.dictionary {
                    expand_dictionary_struct(input, fields, options.relaxed)
                } else {
                    expand_struct(input, fields)
                }
            }
            _ => Err(syn::Error::new(
                input.span(),
                "#[derive(Arg)] requires named fields",
            )),
        },
        Data::Enum(data) => {
            if options.dictionary {
                return Err(syn::Error::new(
                    input.span(),
                    "`dictionary` does not apply to enums",
                ));
            }

            expand_enum(input, data)
        }
        Data::Union(_) => Err(syn::Error::new(
            input.span(),
            "#[derive(Arg)] does not support unions",
        )),
    }
}

/// Struct-of-fields serialization: the signature is the tuple of the field
/// signatures.
fn expand_struct(input: &DeriveInput, fields: &syn::FieldsNamed) -> syn::Result<TokenStream2> {
    let ident = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let names: Vec<&Ident> = fields
        .named
        .iter()
        .map(|field| field.ident.as_ref().expect("named field"))
        .collect();

    let types: Vec<&syn::Type> = fields.named.iter().map(|field| &field.ty).collect();

    Ok(quote! {
        #[automatically_derived]
        impl #impl_generics ::sorbus::Arg for #ident #ty_generics #where_clause {
            fn signature(
                builder: &mut ::sorbus::SignatureBuilder,
            ) -> ::core::result::Result<(), ::sorbus::SignatureError> {
                builder.open_struct()?;
                #(<#types as ::sorbus::Arg>::signature(builder)?;)*
                builder.close_struct()?;
                ::core::result::Result::Ok(())
            }

            fn append(&self, message: &mut ::sorbus::Message) -> ::sorbus::Result<()> {
                message.begin_struct_write();
                #(<#types as ::sorbus::Arg>::append(&self.#names, message)?;)*
                ::sorbus::Result::Ok(())
            }

            fn read(message: &mut ::sorbus::Message) -> ::sorbus::Result<Self> {
                message.begin_struct_read()?;

                ::sorbus::Result::Ok(Self {
                    #(#names: <#types as ::sorbus::Arg>::read(message)?,)*
                })
            }
        }
    })
}

/// `a{sv}` serialization: every key is a field name, every value a
/// variant-wrapped field value.
fn expand_dictionary_struct(
    input: &DeriveInput,
    fields: &syn::FieldsNamed,
    relaxed: bool,
) -> syn::Result<TokenStream2> {
    let ident = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let names: Vec<&Ident> = fields
        .named
        .iter()
        .map(|field| field.ident.as_ref().expect("named field"))
        .collect();

    let keys: Vec<String> = names.iter().map(|name| name.to_string()).collect();
    let types: Vec<&syn::Type> = fields.named.iter().map(|field| &field.ty).collect();

    let read_fields = if relaxed {
        quote! {
            #(#names: match map.get(#keys) {
                ::core::option::Option::Some(value) => value.get::<#types>()?,
                ::core::option::Option::None => ::core::default::Default::default(),
            },)*
        }
    } else {
        quote! {
            #(#names: match map.get(#keys) {
                ::core::option::Option::Some(value) => value.get::<#types>()?,
                ::core::option::Option::None => {
                    return ::sorbus::Result::Err(::sorbus::Error::new(
                        ::sorbus::error::name::INVALID_ARGS,
                        ::std::format!("missing dictionary key `{}`", #keys),
                    ));
                }
            },)*
        }
    };

    Ok(quote! {
        #[automatically_derived]
        impl #impl_generics ::sorbus::Arg for #ident #ty_generics #where_clause {
            fn signature(
                builder: &mut ::sorbus::SignatureBuilder,
            ) -> ::core::result::Result<(), ::sorbus::SignatureError> {
                builder.open_array()?;
                builder.open_dict_entry()?;
                <::std::string::String as ::sorbus::Arg>::signature(builder)?;
                <::sorbus::Variant as ::sorbus::Arg>::signature(builder)?;
                builder.close_dict_entry()?;
                builder.close_array();
                ::core::result::Result::Ok(())
            }

            fn append(&self, message: &mut ::sorbus::Message) -> ::sorbus::Result<()> {
                let mut map = ::std::collections::HashMap::<::std::string::String, ::sorbus::Variant>::new();
                #(map.insert(
                    ::std::string::String::from(#keys),
                    ::sorbus::Variant::new(&self.#names)?,
                );)*
                <::std::collections::HashMap<::std::string::String, ::sorbus::Variant> as ::sorbus::Arg>::append(&map, message)
            }

            fn read(message: &mut ::sorbus::Message) -> ::sorbus::Result<Self> {
                let map = <::std::collections::HashMap<::std::string::String, ::sorbus::Variant> as ::sorbus::Arg>::read(message)?;

                ::sorbus::Result::Ok(Self {
                    #read_fields
                })
            }
        }
    })
}

/// Enums map to their underlying integer type.
fn expand_enum(input: &DeriveInput, data: &syn::DataEnum) -> syn::Result<TokenStream2> {
    let ident = &input.ident;

    for variant in &data.variants {
        if !matches!(variant.fields, Fields::Unit) {
            return Err(syn::Error::new(
                variant.span(),
                "#[derive(Arg)] only supports fieldless enums",
            ));
        }
    }

    let repr = enum_repr(input)?;

    let variants: Vec<&Ident> = data.variants.iter().map(|variant| &variant.ident).collect();

    Ok(quote! {
        #[automatically_derived]
        impl ::sorbus::Arg for #ident {
            fn signature(
                builder: &mut ::sorbus::SignatureBuilder,
            ) -> ::core::result::Result<(), ::sorbus::SignatureError> {
                <#repr as ::sorbus::Arg>::signature(builder)
            }

            fn append(&self, message: &mut ::sorbus::Message) -> ::sorbus::Result<()> {
                let value: #repr = match self {
                    #(Self::#variants => Self::#variants as #repr,)*
                };

                <#repr as ::sorbus::Arg>::append(&value, message)
            }

            fn read(message: &mut ::sorbus::Message) -> ::sorbus::Result<Self> {
                let value = <#repr as ::sorbus::Arg>::read(message)?;

                #(if value == Self::#variants as #repr {
                    return ::sorbus::Result::Ok(Self::#variants);
                })*

                ::sorbus::Result::Err(::sorbus::Error::new(
                    ::sorbus::error::name::INVALID_ARGS,
                    ::std::format!("value {value} is not a known variant"),
                ))
            }
        }
    })
}

/// The integer repr of the enum; defaults to `u32`, the conventional D-Bus
/// enumeration carrier.
fn enum_repr(input: &DeriveInput) -> syn::Result<TokenStream2> {
    for attr in &input.attrs {
        if !attr.path().is_ident("repr") {
            continue;
        }

        let ident: Ident = attr.parse_args()?;

        return match ident.to_string().as_str() {
            "u8" | "i16" | "u16" | "i32" | "u32" | "i64" | "u64" => Ok(quote!(#ident)),
            other => Err(syn::Error::new(
                ident.span(),
                format!("unsupported enum repr `{other}` for D-Bus serialization"),
            )),
        };
    }

    Ok(quote!(u32))
}
