//! Attribute parsing for the CompositeNode derive macro

use syn::{Attribute, DeriveInput, Field, LitStr};

/// Parsed container attributes from #[composite(...)]
#[derive(Debug, Default, Clone)]
pub struct NodeAttributes {
    /// Type tag registered with the factory
    pub name: Option<String>,
}

/// What a field contributes to the generated impls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRole {
    /// The node's `NodeCore`
    Core,
    /// A `RefCell<CompositeList<_>>` whose nodes are children of this node
    Children,
    /// Any other field, default-initialised on construction
    Plain,
}

/// Parse the container attributes of a node struct
pub fn parse_node_attributes(input: &DeriveInput) -> syn::Result<NodeAttributes> {
    let mut attrs = NodeAttributes::default();

    for attr in composite_attrs(&input.attrs) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                let lit: LitStr = meta.value()?.parse()?;
                attrs.name = Some(lit.value());
                Ok(())
            } else {
                Err(meta.error("unsupported composite attribute, expected `name = \"...\"`"))
            }
        })?;
    }

    Ok(attrs)
}

/// Parse the role of a single field
pub fn parse_field_role(field: &Field) -> syn::Result<FieldRole> {
    let mut role = FieldRole::Plain;

    for attr in composite_attrs(&field.attrs) {
        attr.parse_nested_meta(|meta| {
            let next = if meta.path.is_ident("core") {
                FieldRole::Core
            } else if meta.path.is_ident("children") {
                FieldRole::Children
            } else {
                return Err(meta.error("unsupported composite field attribute, expected `core` or `children`"));
            };

            if role != FieldRole::Plain && role != next {
                return Err(meta.error("a field cannot be both `core` and `children`"));
            }
            role = next;
            Ok(())
        })?;
    }

    Ok(role)
}

fn composite_attrs(attrs: &[Attribute]) -> impl Iterator<Item = &Attribute> {
    attrs.iter().filter(|attr| attr.path().is_ident("composite"))
}
