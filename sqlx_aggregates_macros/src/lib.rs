mod relation_attr;

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, DeriveInput, Ident};

use relation_attr::{Kind, RelationAttr};

/// Derives `RelationRegistry` for a model struct.
///
/// The table defaults to the snake_cased struct name and the primary key is
/// the first field. Relations are declared with repeated `#[relation(...)]`
/// attributes:
///
/// ```ignore
/// #[derive(Aggregates)]
/// #[table_name = "users"]
/// #[relation(has_many = "Post", name = "posts")]
/// #[relation(belongs_to_many = "Role", name = "roles", pivot = "role_user")]
/// struct User {
///     id: i64,
///     name: String,
/// }
/// ```
#[proc_macro_derive(Aggregates, attributes(table_name, relation))]
pub fn aggregates_derive(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match Schema::new(&input).map(|schema| schema.gen_registry(&input.ident)) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

struct Schema {
    table_name: String,
    id_field: Ident,
    model_snake: String,
    relations: Vec<RelationAttr>,
}

impl Schema {
    fn new(input: &DeriveInput) -> syn::Result<Self> {
        let mut table_name = None;
        let mut relations = Vec::new();

        for attr in &input.attrs {
            if attr.path.is_ident("table_name") {
                match attr.parse_meta()? {
                    syn::Meta::NameValue(syn::MetaNameValue { lit: syn::Lit::Str(s), .. }) => {
                        table_name = Some(s.value());
                    }
                    other => {
                        return Err(syn::Error::new_spanned(other, "expected #[table_name = \"...\"]"));
                    }
                }
            } else if attr.path.is_ident("relation") {
                relations.push(RelationAttr::parse(attr)?);
            }
        }

        let fields = match &input.data {
            syn::Data::Struct(syn::DataStruct { fields: syn::Fields::Named(named), .. }) => &named.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    &input.ident,
                    "Aggregates can only be derived for structs with named fields",
                ))
            }
        };
        let id_field = fields
            .iter()
            .next()
            .and_then(|field| field.ident.clone())
            .ok_or_else(|| syn::Error::new_spanned(&input.ident, "struct must have at least one field"))?;

        let model_snake = to_snake_case(&input.ident.to_string());

        Ok(Self {
            table_name: table_name.unwrap_or_else(|| model_snake.clone()),
            id_field,
            model_snake,
            relations,
        })
    }

    fn gen_registry(&self, name: &Ident) -> TokenStream2 {
        let table_name = &self.table_name;
        let id_field = self.id_field.to_string();
        let arms = self.relations.iter().map(|relation| self.gen_relation_arm(relation));

        quote! {
            impl ::sqlx_struct_aggregates::RelationRegistry for #name {
                fn scheme() -> &'static ::sqlx_struct_aggregates::Scheme {
                    static SCHEME: ::sqlx_struct_aggregates::Lazy<::sqlx_struct_aggregates::Scheme> =
                        ::sqlx_struct_aggregates::Lazy::new(|| {
                            ::sqlx_struct_aggregates::Scheme::new(#table_name, #id_field)
                        });
                    &SCHEME
                }

                fn relation(name: &str) -> ::std::option::Option<::sqlx_struct_aggregates::Relation> {
                    #[allow(unused_variables)]
                    let parent = <Self as ::sqlx_struct_aggregates::RelationRegistry>::scheme();
                    match name {
                        #(#arms)*
                        _ => ::std::option::Option::None,
                    }
                }
            }
        }
    }

    fn gen_relation_arm(&self, relation: &RelationAttr) -> TokenStream2 {
        let name = &relation.name;
        let related = &relation.related;
        let parent_id = self.id_field.to_string();
        let default_foreign_key = format!("{}_id", self.model_snake);

        let kind = match relation.kind {
            Kind::HasOne | Kind::HasMany => {
                let foreign_key = relation.foreign_key.clone().unwrap_or(default_foreign_key);
                let local_key = relation.local_key.clone().unwrap_or(parent_id);
                let variant = if relation.kind == Kind::HasOne {
                    quote!(HasOne)
                } else {
                    quote!(HasMany)
                };
                quote! {
                    ::sqlx_struct_aggregates::RelationKind::#variant {
                        foreign_key: #foreign_key.to_string(),
                        local_key: #local_key.to_string(),
                    }
                }
            }
            Kind::BelongsTo => {
                let foreign_key = relation
                    .foreign_key
                    .clone()
                    .unwrap_or_else(|| format!("{}_id", to_snake_case(&relation.name)));
                let owner_key = optional_key(&relation.owner_key);
                quote! {
                    ::sqlx_struct_aggregates::RelationKind::BelongsTo {
                        foreign_key: #foreign_key.to_string(),
                        owner_key: #owner_key,
                    }
                }
            }
            Kind::BelongsToMany => {
                let pivot = relation.pivot.clone().unwrap_or_default();
                let foreign_pivot_key = relation.foreign_pivot_key.clone().unwrap_or(default_foreign_key);
                let related_pivot_key = relation
                    .related_pivot_key
                    .clone()
                    .unwrap_or_else(|| format!("{}_id", relation.related_snake()));
                let parent_key = relation.parent_key.clone().unwrap_or(parent_id);
                let related_key = optional_key(&relation.related_key);
                quote! {
                    ::sqlx_struct_aggregates::RelationKind::BelongsToMany {
                        pivot_table: #pivot.to_string(),
                        foreign_pivot_key: #foreign_pivot_key.to_string(),
                        related_pivot_key: #related_pivot_key.to_string(),
                        parent_key: #parent_key.to_string(),
                        related_key: #related_key,
                    }
                }
            }
        };

        let constraints = relation.constraints.iter().map(|clause| {
            quote!(.constraint(#clause))
        });

        quote! {
            #name => {
                let related = <#related as ::sqlx_struct_aggregates::RelationRegistry>::scheme();
                ::std::option::Option::Some(
                    ::sqlx_struct_aggregates::Relation::new(#name, parent, related, #kind)
                        #(#constraints)*
                )
            }
        }
    }
}

// Keys pointing at the related model default to its primary key, which is
// only known once the related registry is resolved.
fn optional_key(key: &Option<String>) -> TokenStream2 {
    match key {
        Some(key) => quote!(#key.to_string()),
        None => quote!(related.id_field.clone()),
    }
}

fn to_snake_case(s: &str) -> String {
    let mut result = String::with_capacity(s.len() * 2);

    for (i, c) in s.char_indices() {
        if i > 0 && c.is_uppercase() {
            result.push('_');
        }
        result.push(c.to_ascii_lowercase());
    }

    result
}
