//! Generate CompositeNode and NodeKind implementations for node structs

use crate::node_attributes::{parse_field_role, parse_node_attributes, FieldRole};
use proc_macro2::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Fields, Ident};

/// Generate both trait implementations
pub fn generate_node_impls(input: &DeriveInput) -> syn::Result<TokenStream> {
    let type_name = &input.ident;
    let attrs = parse_node_attributes(input)?;
    let kind_name = attrs.name.unwrap_or_else(|| type_name.to_string());

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => &named.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    type_name,
                    "CompositeNode can only be derived for structs with named fields",
                ))
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                type_name,
                "CompositeNode can only be derived for structs",
            ))
        }
    };

    let mut core_field: Option<&Ident> = None;
    let mut children: Vec<&Ident> = Vec::new();
    let mut plain: Vec<&Ident> = Vec::new();

    for field in fields {
        let Some(ident) = field.ident.as_ref() else {
            continue;
        };
        match parse_field_role(field)? {
            FieldRole::Core => {
                if core_field.is_some() {
                    return Err(syn::Error::new_spanned(
                        field,
                        "only one field can be marked #[composite(core)]",
                    ));
                }
                core_field = Some(ident);
            }
            FieldRole::Children => children.push(ident),
            FieldRole::Plain => plain.push(ident),
        }
    }

    // Without an explicit marker the field named `core` holds the NodeCore
    let core_field = match core_field {
        Some(ident) => ident,
        None => {
            let position = plain.iter().position(|ident| *ident == "core").ok_or_else(|| {
                syn::Error::new_spanned(
                    type_name,
                    "missing node core: add a `core: NodeCore` field or mark one with #[composite(core)]",
                )
            })?;
            plain.remove(position)
        }
    };

    let node_impl = generate_composite_node_impl(input, core_field, &children, &kind_name);
    let kind_impl = generate_node_kind_impl(input, core_field, &children, &plain, &kind_name);

    Ok(quote! {
        #node_impl
        #kind_impl
    })
}

fn generate_composite_node_impl(
    input: &DeriveInput,
    core_field: &Ident,
    children: &[&Ident],
    kind_name: &str,
) -> TokenStream {
    let type_name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let children_fn = if children.is_empty() {
        quote! {}
    } else {
        quote! {
            fn children(&self) -> ::std::vec::Vec<::std::rc::Rc<dyn ::composite::CompositeNode>> {
                let mut children = ::std::vec::Vec::new();
                #(
                    children.extend(::std::cell::RefCell::borrow(&self.#children).nodes());
                )*
                children
            }
        }
    };

    quote! {
        impl #impl_generics ::composite::CompositeNode for #type_name #ty_generics #where_clause {
            fn core(&self) -> &::composite::NodeCore {
                &self.#core_field
            }

            fn type_tag(&self) -> &'static str {
                #kind_name
            }

            fn into_any(self: ::std::rc::Rc<Self>) -> ::std::rc::Rc<dyn ::std::any::Any> {
                self
            }

            fn as_node(self: ::std::rc::Rc<Self>) -> ::std::rc::Rc<dyn ::composite::CompositeNode> {
                self
            }

            #children_fn
        }
    }
}

fn generate_node_kind_impl(
    input: &DeriveInput,
    core_field: &Ident,
    children: &[&Ident],
    plain: &[&Ident],
    kind_name: &str,
) -> TokenStream {
    let type_name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    // Children lists are owned by the node being constructed
    let owner_binding = if children.is_empty() {
        quote! {}
    } else {
        quote! {
            let owner = ::composite::Owner::Node(core.id());
        }
    };

    quote! {
        impl #impl_generics ::composite::NodeKind for #type_name #ty_generics #where_clause {
            fn kind_name() -> &'static str {
                #kind_name
            }

            fn construct(core: ::composite::NodeCore) -> Self {
                #owner_binding
                Self {
                    #(
                        #children: ::std::cell::RefCell::new(::composite::CompositeList::new(owner)),
                    )*
                    #(
                        #plain: ::std::default::Default::default(),
                    )*
                    #core_field: core,
                }
            }
        }
    }
}
