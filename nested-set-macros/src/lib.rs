use proc_macro::TokenStream;
use quote::{format_ident, quote};
use syn::{parse_macro_input, spanned::Spanned, Attribute, Data, DeriveInput, Fields, Ident};

#[proc_macro_derive(NestedSetModel, attributes(nested_set))]
pub fn derive_nested_set_model(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match impl_nested_set_model(&input) {
        Ok(tokens) => tokens,
        Err(err) => err.to_compile_error().into(),
    }
}

#[derive(Default)]
struct Options {
    id_field: Option<String>,
    parent_field: Option<String>,
    left_field: Option<String>,
    right_field: Option<String>,
    depth_field: Option<String>,
    ordering_field: Option<String>,
    deleted_at_column: Option<String>,
    schema: Option<String>,
}

fn impl_nested_set_model(input: &DeriveInput) -> syn::Result<TokenStream> {
    let struct_ident = &input.ident;

    let data_struct = match &input.data {
        Data::Struct(data) => data,
        _ => {
            return Err(syn::Error::new(
                input.span(),
                "NestedSetModel can only be derived for structs",
            ))
        }
    };

    let mut options = Options::default();
    let mut table_name: Option<String> = None;

    for attr in &input.attrs {
        if attr.path().is_ident("nested_set") {
            parse_nested_set_attr(attr, &mut options)?;
        }

        if attr.path().is_ident("sea_orm") {
            if let Some(name) = parse_sea_orm_table_name(attr)? {
                table_name = Some(name);
            }
        }
    }

    let id_field_name = options.id_field.unwrap_or_else(|| "id".to_string());
    let parent_field_name = options
        .parent_field
        .unwrap_or_else(|| "parent_id".to_string());
    let left_field_name = options
        .left_field
        .unwrap_or_else(|| "record_left".to_string());
    let right_field_name = options
        .right_field
        .unwrap_or_else(|| "record_right".to_string());
    let depth_field_name = options
        .depth_field
        .unwrap_or_else(|| "record_depth".to_string());
    let ordering_field_name = options
        .ordering_field
        .unwrap_or_else(|| "record_ordering".to_string());
    let deleted_at_column = options
        .deleted_at_column
        .unwrap_or_else(|| "deleted_at".to_string());

    let field_names = [
        &id_field_name,
        &parent_field_name,
        &left_field_name,
        &right_field_name,
        &depth_field_name,
        &ordering_field_name,
    ];

    match &data_struct.fields {
        Fields::Named(fields) => {
            for name in field_names {
                let present = fields
                    .named
                    .iter()
                    .any(|field| field.ident.as_ref().is_some_and(|ident| *ident == name.as_str()));
                if !present {
                    return Err(syn::Error::new(
                        struct_ident.span(),
                        format!("NestedSetModel requires a `{name}` field; rename it with #[nested_set(...)]"),
                    ));
                }
            }
        }
        _ => {
            return Err(syn::Error::new(
                data_struct.fields.span(),
                "NestedSetModel requires named fields",
            ))
        }
    }

    let table = table_name.ok_or_else(|| {
        syn::Error::new(
            struct_ident.span(),
            "NestedSetModel needs #[sea_orm(table_name = \"...\")] on the model",
        )
    })?;

    let id_field = Ident::new(&id_field_name, struct_ident.span());
    let parent_field = Ident::new(&parent_field_name, struct_ident.span());
    let left_field = Ident::new(&left_field_name, struct_ident.span());
    let right_field = Ident::new(&right_field_name, struct_ident.span());
    let depth_field = Ident::new(&depth_field_name, struct_ident.span());
    let ordering_field = Ident::new(&ordering_field_name, struct_ident.span());

    let id_column_variant = format_ident!("{}", to_pascal_case(&id_field_name));
    let left_column_variant = format_ident!("{}", to_pascal_case(&left_field_name));

    let schema_option = options.schema.map(|schema| {
        let literal = syn::LitStr::new(&schema, struct_ident.span());
        quote! { .schema(#literal) }
    });

    let lit = |value: &str| syn::LitStr::new(value, struct_ident.span());
    let table_literal = lit(&table);
    let id_literal = lit(&id_field_name);
    let parent_literal = lit(&parent_field_name);
    let left_literal = lit(&left_field_name);
    let right_literal = lit(&right_field_name);
    let depth_literal = lit(&depth_field_name);
    let ordering_literal = lit(&ordering_field_name);
    let deleted_literal = lit(&deleted_at_column);

    let generated = quote! {
        impl ::nested_set::NestedSetModel for #struct_ident {
            type Entity = Entity;
            type ActiveModel = ActiveModel;

            fn nested_set_config() -> &'static ::nested_set::NestedSetConfig {
                static CONFIG: ::nested_set::__private::Lazy<::nested_set::NestedSetConfig> =
                    ::nested_set::__private::Lazy::new(|| {
                        ::nested_set::NestedSetOptions::default()
                            #schema_option
                            .id_column(#id_literal)
                            .parent_column(#parent_literal)
                            .left_column(#left_literal)
                            .right_column(#right_literal)
                            .depth_column(#depth_literal)
                            .ordering_column(#ordering_literal)
                            .deleted_at_column(#deleted_literal)
                            .apply(::nested_set::NestedSetConfig::new(#table_literal))
                    });
                &CONFIG
            }

            fn id(&self) -> ::nested_set::NodeId {
                self.#id_field
            }

            fn parent_id(&self) -> ::core::option::Option<::nested_set::NodeId> {
                self.#parent_field
            }

            fn coordinates(&self) -> ::nested_set::Coordinates {
                ::nested_set::Coordinates::new(
                    ::core::convert::From::from(self.#left_field),
                    ::core::convert::From::from(self.#right_field),
                    ::core::convert::From::from(self.#depth_field),
                    ::core::convert::From::from(self.#ordering_field),
                )
            }

            fn set_parent(
                active: &mut Self::ActiveModel,
                parent: ::core::option::Option<::nested_set::NodeId>,
            ) {
                active.#parent_field = ::sea_orm::ActiveValue::Set(parent);
            }

            fn set_coordinates(
                active: &mut Self::ActiveModel,
                coordinates: &::nested_set::Coordinates,
            ) -> ::core::result::Result<(), ::nested_set::NestedSetError> {
                active.#left_field = ::sea_orm::ActiveValue::Set(
                    ::core::convert::TryInto::try_into(coordinates.left)
                        .map_err(|_| ::nested_set::NestedSetError::invariant(
                            concat!("coordinate out of range for `", #left_literal, "`"),
                        ))?,
                );
                active.#right_field = ::sea_orm::ActiveValue::Set(
                    ::core::convert::TryInto::try_into(coordinates.right)
                        .map_err(|_| ::nested_set::NestedSetError::invariant(
                            concat!("coordinate out of range for `", #right_literal, "`"),
                        ))?,
                );
                active.#depth_field = ::sea_orm::ActiveValue::Set(
                    ::core::convert::TryInto::try_into(coordinates.depth)
                        .map_err(|_| ::nested_set::NestedSetError::invariant(
                            concat!("coordinate out of range for `", #depth_literal, "`"),
                        ))?,
                );
                active.#ordering_field = ::sea_orm::ActiveValue::Set(
                    ::core::convert::TryInto::try_into(coordinates.ordering)
                        .map_err(|_| ::nested_set::NestedSetError::invariant(
                            concat!("coordinate out of range for `", #ordering_literal, "`"),
                        ))?,
                );
                ::core::result::Result::Ok(())
            }

            fn id_column() -> <Self::Entity as ::sea_orm::EntityTrait>::Column {
                Column::#id_column_variant
            }

            fn left_column() -> <Self::Entity as ::sea_orm::EntityTrait>::Column {
                Column::#left_column_variant
            }
        }
    };

    Ok(generated.into())
}

fn parse_nested_set_attr(attr: &Attribute, options: &mut Options) -> syn::Result<()> {
    attr.parse_nested_meta(|meta| {
        let ident = meta
            .path
            .get_ident()
            .ok_or_else(|| syn::Error::new(meta.path.span(), "Invalid option key"))?
            .to_string();

        let value: syn::LitStr = meta.value()?.parse()?;
        let slot = match ident.as_str() {
            "id_field" => &mut options.id_field,
            "parent_field" => &mut options.parent_field,
            "left_field" => &mut options.left_field,
            "right_field" => &mut options.right_field,
            "depth_field" => &mut options.depth_field,
            "ordering_field" => &mut options.ordering_field,
            "deleted_at_column" => &mut options.deleted_at_column,
            "schema" => &mut options.schema,
            other => {
                return Err(syn::Error::new(
                    meta.path.span(),
                    format!("Unsupported nested_set option `{other}`"),
                ));
            }
        };
        *slot = Some(value.value());

        Ok(())
    })
}

fn parse_sea_orm_table_name(attr: &Attribute) -> syn::Result<Option<String>> {
    let mut table_name: Option<String> = None;
    attr.parse_nested_meta(|meta| {
        if meta.path.is_ident("table_name") {
            let value: syn::LitStr = meta.value()?.parse()?;
            table_name = Some(value.value());
        } else if meta.input.peek(syn::Token![=]) {
            let _: syn::Expr = meta.value()?.parse()?;
        }
        Ok(())
    })?;
    Ok(table_name)
}

fn to_pascal_case(value: &str) -> String {
    value
        .split('_')
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            let mut chars = segment.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}
