mod node_attributes;
mod node_generator;

use proc_macro::TokenStream;
use syn::{parse_macro_input, DeriveInput};

/// Derive macro for the CompositeNode and NodeKind traits
///
/// ```ignore
/// #[derive(CompositeNode)]
/// #[composite(name = "Folder")]
/// pub struct Folder {
///     #[composite(core)]
///     core: NodeCore,
///     #[composite(children)]
///     items: RefCell<CompositeList<dyn CompositeNode>>,
///     label: RefCell<String>,
/// }
/// ```
///
/// The type tag defaults to the struct name. The core field defaults to the
/// field called `core`. Children lists are created owned by the node, every
/// other field starts from `Default::default()`.
#[proc_macro_derive(CompositeNode, attributes(composite))]
pub fn derive_composite_node(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    node_generator::generate_node_impls(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}
