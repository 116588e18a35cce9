//! Procedural macros for SchemaCompare
//!
//! This crate provides the `TableModel` derive macro, which turns an annotated
//! struct into a `schema_compare::Table` definition.
//!
//! ```ignore
//! #[derive(TableModel)]
//! #[table(name = "users")]
//! struct User {
//!     #[column(primary_key, autoincrement)]
//!     id: i64,
//!     #[column(length = 180, unique)]
//!     email: String,
//!     nickname: Option<String>,
//! }
//! ```

use inflector::Inflector;
use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{
    parse_macro_input, Data, DeriveInput, Field, Fields, GenericArgument, Lit, LitStr,
    PathArguments, Type,
};

/// Derive macro for `schema_compare::TableModel`
#[proc_macro_derive(TableModel, attributes(table, column))]
pub fn derive_table_model(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    expand_table_model(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

/// Struct level `#[table(...)]` arguments
#[derive(Default)]
struct TableArgs {
    name: Option<String>,
}

/// Field level `#[column(...)]` arguments
#[derive(Default)]
struct ColumnArgs {
    name: Option<String>,
    column_type: Option<String>,
    length: Option<u32>,
    precision: Option<u32>,
    scale: Option<u32>,
    nullable: bool,
    unsigned: bool,
    fixed: bool,
    autoincrement: bool,
    default: Option<Lit>,
    comment: Option<String>,
    primary_key: bool,
    unique: bool,
}

fn expand_table_model(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    name,
                    "TableModel only supports structs with named fields",
                ))
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                name,
                "TableModel only supports structs",
            ))
        }
    };

    let table_args = parse_table_args(input)?;
    let table_name = table_args
        .name
        .unwrap_or_else(|| name.to_string().to_snake_case());

    let mut columns = Vec::new();
    let mut primary_key = Vec::new();
    let mut unique_columns = Vec::new();

    for field in fields {
        let args = parse_column_args(field)?;
        let column_name = match (&args.name, &field.ident) {
            (Some(name), _) => name.clone(),
            (None, Some(ident)) => ident.to_string().trim_start_matches("r#").to_string(),
            (None, None) => continue,
        };

        let (inner_type, is_option) = unwrap_option(&field.ty);
        let (column_type, unsigned) = match &args.column_type {
            Some(column_type) => (column_type.clone(), args.unsigned),
            None => {
                let (inferred, unsigned) = infer_column_type(inner_type).ok_or_else(|| {
                    syn::Error::new_spanned(
                        &field.ty,
                        "cannot infer a column type, use #[column(type = \"...\")]",
                    )
                })?;
                (inferred.to_string(), args.unsigned || unsigned)
            }
        };

        let not_null = !(args.nullable || is_option);
        let mut builder = quote! {
            ::schema_compare::Column::new(
                #column_name,
                ::schema_compare::ColumnType::from_name(#column_type),
            )
            .not_null(#not_null)
        };

        if let Some(length) = args.length {
            builder = quote! { #builder.length(#length) };
        }
        if let Some(precision) = args.precision {
            builder = quote! { #builder.precision(#precision) };
        }
        if let Some(scale) = args.scale {
            builder = quote! { #builder.scale(#scale) };
        }
        if unsigned {
            builder = quote! { #builder.unsigned(true) };
        }
        if args.fixed {
            builder = quote! { #builder.fixed(true) };
        }
        if args.autoincrement {
            builder = quote! { #builder.autoincrement(true) };
        }
        if let Some(default) = &args.default {
            builder = quote! { #builder.default_value(#default) };
        }
        if let Some(comment) = &args.comment {
            builder = quote! { #builder.comment(#comment) };
        }

        columns.push(builder);

        if args.primary_key {
            primary_key.push(column_name.clone());
        }
        if args.unique {
            unique_columns.push(column_name);
        }
    }

    let primary_key_statement = if primary_key.is_empty() {
        quote! {}
    } else {
        quote! { table.set_primary_key(&[#(#primary_key),*], ::std::option::Option::None)?; }
    };

    Ok(quote! {
        #[automatically_derived]
        impl #impl_generics ::schema_compare::TableModel for #name #ty_generics #where_clause {
            fn table_name() -> ::std::string::String {
                ::std::string::String::from(#table_name)
            }

            fn define_table() -> ::schema_compare::Result<::schema_compare::Table> {
                let mut table = ::schema_compare::Table::new(#table_name)?;
                #( table.add_column(#columns)?; )*
                #primary_key_statement
                #(
                    table.add_unique_index(
                        &[#unique_columns],
                        ::std::option::Option::None,
                        ::std::default::Default::default(),
                    )?;
                )*
                ::std::result::Result::Ok(table)
            }
        }
    })
}

fn parse_table_args(input: &DeriveInput) -> syn::Result<TableArgs> {
    let mut args = TableArgs::default();

    for attr in &input.attrs {
        if !attr.path().is_ident("table") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                args.name = Some(meta.value()?.parse::<LitStr>()?.value());
                Ok(())
            } else {
                Err(meta.error("unsupported table attribute"))
            }
        })?;
    }

    Ok(args)
}

fn parse_column_args(field: &Field) -> syn::Result<ColumnArgs> {
    let mut args = ColumnArgs::default();

    for attr in &field.attrs {
        if !attr.path().is_ident("column") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            let path = &meta.path;

            if path.is_ident("name") {
                args.name = Some(meta.value()?.parse::<LitStr>()?.value());
            } else if path.is_ident("type") {
                args.column_type = Some(meta.value()?.parse::<LitStr>()?.value());
            } else if path.is_ident("length") {
                args.length = Some(meta.value()?.parse::<syn::LitInt>()?.base10_parse()?);
            } else if path.is_ident("precision") {
                args.precision = Some(meta.value()?.parse::<syn::LitInt>()?.base10_parse()?);
            } else if path.is_ident("scale") {
                args.scale = Some(meta.value()?.parse::<syn::LitInt>()?.base10_parse()?);
            } else if path.is_ident("default") {
                args.default = Some(meta.value()?.parse::<Lit>()?);
            } else if path.is_ident("comment") {
                args.comment = Some(meta.value()?.parse::<LitStr>()?.value());
            } else if path.is_ident("nullable") {
                args.nullable = true;
            } else if path.is_ident("unsigned") {
                args.unsigned = true;
            } else if path.is_ident("fixed") {
                args.fixed = true;
            } else if path.is_ident("autoincrement") {
                args.autoincrement = true;
            } else if path.is_ident("primary_key") {
                args.primary_key = true;
            } else if path.is_ident("unique") {
                args.unique = true;
            } else {
                return Err(meta.error("unsupported column attribute"));
            }

            Ok(())
        })?;
    }

    Ok(args)
}

/// Strip one `Option<...>` layer, reporting whether it was there
fn unwrap_option(ty: &Type) -> (&Type, bool) {
    match generic_argument(ty, "Option") {
        Some(inner) => (inner, true),
        None => (ty, false),
    }
}

/// The single type argument of `wrapper<T>`, if `ty` is that wrapper
fn generic_argument<'a>(ty: &'a Type, wrapper: &str) -> Option<&'a Type> {
    let Type::Path(type_path) = ty else {
        return None;
    };
    let segment = type_path.path.segments.last()?;
    if segment.ident != wrapper {
        return None;
    }

    let PathArguments::AngleBracketed(arguments) = &segment.arguments else {
        return None;
    };

    arguments.args.iter().find_map(|argument| match argument {
        GenericArgument::Type(inner) => Some(inner),
        _ => None,
    })
}

/// Column type name and unsignedness for a Rust field type
fn infer_column_type(ty: &Type) -> Option<(&'static str, bool)> {
    if let Type::Reference(reference) = ty {
        return infer_column_type(&reference.elem);
    }

    if let Some(inner) = generic_argument(ty, "Vec") {
        return match last_ident(inner)?.as_str() {
            "u8" => Some(("blob", false)),
            "String" => Some(("simple_array", false)),
            _ => None,
        };
    }

    let mapped = match last_ident(ty)?.as_str() {
        "i8" | "i16" => ("smallint", false),
        "u8" | "u16" => ("smallint", true),
        "i32" => ("integer", false),
        "u32" => ("integer", true),
        "i64" | "isize" => ("bigint", false),
        "u64" | "usize" => ("bigint", true),
        "f32" | "f64" => ("float", false),
        "bool" => ("boolean", false),
        "String" | "str" => ("string", false),
        "Uuid" => ("guid", false),
        "NaiveDate" => ("date", false),
        "NaiveTime" => ("time", false),
        "NaiveDateTime" => ("datetime", false),
        "DateTime" => ("datetimetz", false),
        "Decimal" => ("decimal", false),
        "Value" => ("json", false),
        _ => return None,
    };

    Some(mapped)
}

fn last_ident(ty: &Type) -> Option<String> {
    match ty {
        Type::Path(type_path) => type_path
            .path
            .segments
            .last()
            .map(|segment| segment.ident.to_string()),
        _ => None,
    }
}
