use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::quote;
use syn::{
    parse_macro_input, Data, DeriveInput, Expr, Fields, GenericArgument, LitStr, PathArguments,
    Type,
};

/// Rust integer types stored as `FieldType::Int`.
const INTEGER_TYPES: [&str; 7] = ["i8", "i16", "i32", "i64", "u8", "u16", "u32"];

/// Struct-level `#[model(...)]` options.
#[derive(Default)]
struct ModelArgs {
    /// Explicit table name, overriding the snake_cased type name.
    table_name: Option<LitStr>,
    /// Primary key field, `id` when absent.
    primary_key: Option<LitStr>,
    /// Registry alias the model lives in.
    database: Option<LitStr>,
}

impl ModelArgs {
    fn from_attrs(attrs: &[syn::Attribute]) -> syn::Result<Self> {
        let mut args = ModelArgs::default();
        for attr in attrs.iter().filter(|a| a.path().is_ident("model")) {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("table_name") {
                    args.table_name = Some(meta.value()?.parse()?);
                } else if meta.path.is_ident("primary_key") {
                    args.primary_key = Some(meta.value()?.parse()?);
                } else if meta.path.is_ident("database") {
                    args.database = Some(meta.value()?.parse()?);
                } else {
                    return Err(meta.error("expected `table_name`, `primary_key` or `database`"));
                }
                Ok(())
            })?;
        }
        Ok(args)
    }
}

/// Field default from `#[model(default = <expr>)]`.
fn field_default(attrs: &[syn::Attribute]) -> syn::Result<Option<Expr>> {
    let mut default = None;
    for attr in attrs.iter().filter(|a| a.path().is_ident("model")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("default") {
                default = Some(meta.value()?.parse()?);
                Ok(())
            } else {
                Err(meta.error("expected `default`"))
            }
        })?;
    }
    Ok(default)
}

/// Single generic argument of `Option<T>`, `Vec<T>` or `Box<T>`.
fn inner_type(arguments: &PathArguments) -> Option<&Type> {
    match arguments {
        PathArguments::AngleBracketed(args) if args.args.len() == 1 => match args.args.first() {
            Some(GenericArgument::Type(ty)) => Some(ty),
            _ => None,
        },
        _ => None,
    }
}

/// Translate a Rust field type into a `FieldType` expression. Types taken
/// to be model references are pushed onto `models` so the expansion can
/// require them to implement `Model`.
fn field_type(ty: &Type, models: &mut Vec<Type>) -> syn::Result<proc_macro2::TokenStream> {
    let unsupported = || syn::Error::new_spanned(ty, "unsupported model field type");

    let path = match ty {
        Type::Path(type_path) if type_path.qself.is_none() => &type_path.path,
        Type::Group(group) => return field_type(&group.elem, models),
        Type::Paren(paren) => return field_type(&paren.elem, models),
        _ => return Err(unsupported()),
    };
    let segment = path.segments.last().ok_or_else(unsupported)?;
    let name = segment.ident.to_string();

    let tokens = match name.as_str() {
        "Option" => {
            let inner = inner_type(&segment.arguments).ok_or_else(unsupported)?;
            let inner = field_type(inner, models)?;
            quote! { ::riverorm::FieldType::optional(#inner) }
        }
        "Vec" => {
            let inner = inner_type(&segment.arguments).ok_or_else(unsupported)?;
            if is_ident(inner, "u8") {
                quote! { ::riverorm::FieldType::Bytes }
            } else {
                let inner = field_type(inner, models)?;
                quote! { ::riverorm::FieldType::list(#inner) }
            }
        }
        "Box" => field_type(inner_type(&segment.arguments).ok_or_else(unsupported)?, models)?,
        name if INTEGER_TYPES.contains(&name) => quote! { ::riverorm::FieldType::Int },
        "f32" | "f64" => quote! { ::riverorm::FieldType::Float },
        "String" => quote! { ::riverorm::FieldType::Str },
        "bool" => quote! { ::riverorm::FieldType::Bool },
        "NaiveDateTime" => quote! { ::riverorm::FieldType::DateTime },
        "NaiveDate" => quote! { ::riverorm::FieldType::Date },
        "Uuid" => quote! { ::riverorm::FieldType::Uuid },
        "u64" | "u128" | "i128" | "usize" | "isize" | "char" | "str" => return Err(unsupported()),
        _ if segment.arguments.is_empty() => {
            models.push(ty.clone());
            let model = LitStr::new(&name, Span::call_site());
            quote! { ::riverorm::FieldType::Model(#model) }
        }
        _ => return Err(unsupported()),
    };
    Ok(tokens)
}

fn is_ident(ty: &Type, ident: &str) -> bool {
    matches!(ty, Type::Path(p) if p.qself.is_none() && p.path.is_ident(ident))
}

/// Whether `ty` is `Option<T>` with `T` one of [`INTEGER_TYPES`].
fn is_optional_integer(ty: &Type) -> bool {
    let Type::Path(type_path) = ty else {
        return false;
    };
    let Some(segment) = type_path.path.segments.last() else {
        return false;
    };
    segment.ident == "Option"
        && inner_type(&segment.arguments)
            .is_some_and(|inner| INTEGER_TYPES.iter().any(|name| is_ident(inner, name)))
}

/// Derives `riverorm::Model` for a struct with named fields.
///
/// ```ignore
/// #[derive(Serialize, Deserialize, Model)]
/// #[model(table_name = "accounts")]
/// struct User {
///     id: Option<i64>,
///     username: String,
///     #[model(default = true)]
///     is_active: bool,
/// }
/// ```
#[proc_macro_derive(Model, attributes(model))]
pub fn derive_model(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    derive_model_impl(input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

// Non-proc-macro version that can be tested
fn derive_model_impl(input: DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let ident = &input.ident;
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "Model cannot be derived for generic types",
        ));
    }

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => &named.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    ident,
                    "Model requires a struct with named fields",
                ))
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                ident,
                "Model can only be derived for structs",
            ))
        }
    };

    let args = ModelArgs::from_attrs(&input.attrs)?;
    let primary_key = args
        .primary_key
        .as_ref()
        .map(LitStr::value)
        .unwrap_or_else(|| "id".to_string());

    let mut field_calls = Vec::with_capacity(fields.len());
    let mut models = Vec::new();
    let mut has_primary_key = false;
    for field in fields {
        let Some(field_ident) = &field.ident else {
            continue;
        };
        let name = field_ident.to_string();
        let name = name.strip_prefix("r#").unwrap_or(&name).to_string();
        if name == primary_key {
            // An unset key must serialize as null for save() to insert
            if !is_optional_integer(&field.ty) {
                return Err(syn::Error::new_spanned(
                    &field.ty,
                    format!(
                        "primary key `{}` must be an optional integer such as `Option<i64>`",
                        primary_key
                    ),
                ));
            }
            has_primary_key = true;
        }

        let ty = field_type(&field.ty, &mut models)?;
        let call = match field_default(&field.attrs)? {
            Some(default) => quote! { .field_with_default(#name, #ty, #default) },
            None => quote! { .field(#name, #ty) },
        };
        field_calls.push(call);
    }

    if !has_primary_key {
        let span = args
            .primary_key
            .as_ref()
            .map(LitStr::span)
            .unwrap_or_else(|| ident.span());
        return Err(syn::Error::new(
            span,
            format!("model {} has no primary key field `{}`", ident, primary_key),
        ));
    }

    let type_name = ident.to_string();
    let table_name = args.table_name.map(|t| quote! { .table_name(#t) });
    let database = args.database.map(|d| quote! { .database(#d) });
    let model_checks = (!models.is_empty()).then(|| {
        quote! {
            const _: () = {
                fn assert_model<T: ::riverorm::Model>() {}
                #(let _ = assert_model::<#models>;)*
            };
        }
    });

    Ok(quote! {
        impl ::riverorm::Model for #ident {
            fn schema() -> &'static ::riverorm::ModelSchema {
                static SCHEMA: ::riverorm::__private::OnceCell<::riverorm::ModelSchema> =
                    ::riverorm::__private::OnceCell::new();
                SCHEMA.get_or_init(|| {
                    ::riverorm::ModelSchema::builder(#type_name)
                        #table_name
                        .primary_key(#primary_key)
                        #database
                        #(#field_calls)*
                        .build()
                })
            }
        }

        #model_checks
    })
}
