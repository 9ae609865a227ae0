// Parsing of `#[relation(...)]` attributes.

use syn::spanned::Spanned;
use syn::{Attribute, Lit, Meta, NestedMeta, Path};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    HasOne,
    HasMany,
    BelongsTo,
    BelongsToMany,
}

impl Kind {
    fn from_key(key: &str) -> Option<Self> {
        match key {
            "has_one" => Some(Kind::HasOne),
            "has_many" => Some(Kind::HasMany),
            "belongs_to" => Some(Kind::BelongsTo),
            "belongs_to_many" => Some(Kind::BelongsToMany),
            _ => None,
        }
    }
}

/// One declared relation, with unset keys left to the generator's defaults.
pub struct RelationAttr {
    pub kind: Kind,
    pub related: Path,
    pub name: String,
    pub foreign_key: Option<String>,
    pub local_key: Option<String>,
    pub owner_key: Option<String>,
    pub pivot: Option<String>,
    pub foreign_pivot_key: Option<String>,
    pub related_pivot_key: Option<String>,
    pub parent_key: Option<String>,
    pub related_key: Option<String>,
    pub constraints: Vec<String>,
}

impl RelationAttr {
    pub fn parse(attr: &Attribute) -> syn::Result<Self> {
        let list = match attr.parse_meta()? {
            Meta::List(list) => list,
            other => {
                return Err(syn::Error::new(
                    other.span(),
                    "expected #[relation(has_many = \"Type\", name = \"...\", ...)]",
                ))
            }
        };

        let mut kind = None;
        let mut related = None;
        let mut name = None;
        let mut foreign_key = None;
        let mut local_key = None;
        let mut owner_key = None;
        let mut pivot = None;
        let mut foreign_pivot_key = None;
        let mut related_pivot_key = None;
        let mut parent_key = None;
        let mut related_key = None;
        let mut constraints = Vec::new();

        for nested in list.nested.iter() {
            let pair = match nested {
                NestedMeta::Meta(Meta::NameValue(pair)) => pair,
                other => return Err(syn::Error::new(other.span(), "expected `key = \"value\"`")),
            };
            let key = pair
                .path
                .get_ident()
                .map(|ident| ident.to_string())
                .unwrap_or_default();
            let value = match &pair.lit {
                Lit::Str(s) => s,
                other => return Err(syn::Error::new(other.span(), "expected a string literal")),
            };

            if let Some(k) = Kind::from_key(&key) {
                if kind.is_some() {
                    return Err(syn::Error::new(pair.path.span(), "relation kind given twice"));
                }
                kind = Some(k);
                related = Some(value.parse::<Path>()?);
                continue;
            }

            let slot = match key.as_str() {
                "name" => &mut name,
                "foreign_key" => &mut foreign_key,
                "local_key" => &mut local_key,
                "owner_key" => &mut owner_key,
                "pivot" => &mut pivot,
                "foreign_pivot_key" => &mut foreign_pivot_key,
                "related_pivot_key" => &mut related_pivot_key,
                "parent_key" => &mut parent_key,
                "related_key" => &mut related_key,
                "constraint" => {
                    constraints.push(value.value());
                    continue;
                }
                _ => {
                    return Err(syn::Error::new(
                        pair.path.span(),
                        format!("unknown relation option `{}`", key),
                    ))
                }
            };
            *slot = Some(value.value());
        }

        let (kind, related) = match (kind, related) {
            (Some(kind), Some(related)) => (kind, related),
            _ => {
                return Err(syn::Error::new(
                    list.span(),
                    "missing relation kind: has_one, has_many, belongs_to or belongs_to_many",
                ))
            }
        };
        let name = name.ok_or_else(|| syn::Error::new(list.span(), "missing relation `name`"))?;

        if kind == Kind::BelongsToMany && pivot.is_none() {
            return Err(syn::Error::new(list.span(), "belongs_to_many requires `pivot`"));
        }

        Ok(Self {
            kind,
            related,
            name,
            foreign_key,
            local_key,
            owner_key,
            pivot,
            foreign_pivot_key,
            related_pivot_key,
            parent_key,
            related_key,
            constraints,
        })
    }

    /// Snake-cased last segment of the related type, e.g. `Post` -> `post`.
    pub fn related_snake(&self) -> String {
        self.related
            .segments
            .last()
            .map(|segment| crate::to_snake_case(&segment.ident.to_string()))
            .unwrap_or_default()
    }
}
