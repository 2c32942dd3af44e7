// SPDX-License-Identifier: MIT OR Apache-2.0
//! Shared documents for unit tests.

use crate::graphs::procedural::create_procedural_registry;
use crate::graphs::shading::{create_shading_registry, SHADER_ID_PROPERTY, SHADER_TYPE};
use crate::node::NodeRegistry;
use crate::port::PortTemplate;
use nodeweave_document::{
    DocPath, DocumentAdapter, DocumentHandle, MemoryDocument, MemorySelection, NodeMetadata,
    Property, PropertyPath, PropertyValue, SelectionHandle,
};
use std::cell::RefCell;
use std::rc::Rc;

pub(crate) fn path(s: &str) -> DocPath {
    DocPath::parse(s).unwrap()
}

/// Concrete document and selection plus their trait-object handles
pub(crate) struct Fixture {
    pub document: Rc<RefCell<MemoryDocument>>,
    pub handle: DocumentHandle,
    pub selection: Rc<RefCell<MemorySelection>>,
    pub selection_handle: SelectionHandle,
}

impl Fixture {
    pub fn new(document: MemoryDocument) -> Self {
        let document = Rc::new(RefCell::new(document));
        let handle: DocumentHandle = document.clone();
        let selection = Rc::new(RefCell::new(MemorySelection::new()));
        let selection_handle: SelectionHandle = selection.clone();
        Self {
            document,
            handle,
            selection,
            selection_handle,
        }
    }

    pub fn procedural() -> Self {
        Self::new(procedural_document())
    }
}

fn add_catalog_node(
    doc: &mut MemoryDocument,
    registry: &NodeRegistry,
    node: &str,
    type_id: &str,
    position: [f32; 2],
) -> nodeweave_document::adapter::Result<()> {
    let node_path = path(node);
    doc.create_node(&node_path, type_id)?;
    if let Some(node_type) = registry.get(type_id) {
        for property in node_type.ports().map(PortTemplate::to_property) {
            doc.create_property(&node_path, property)?;
        }
    }
    doc.set_metadata(
        &node_path,
        NodeMetadata {
            position,
            ..Default::default()
        },
    )
}

fn add_shader(
    doc: &mut MemoryDocument,
    registry: &NodeRegistry,
    node: &str,
    shader_id: &str,
    position: [f32; 2],
) -> nodeweave_document::adapter::Result<()> {
    add_catalog_node(doc, &NodeRegistry::new(), node, SHADER_TYPE, position)?;
    let node_path = path(node);
    doc.create_property(
        &node_path,
        Property::new(SHADER_ID_PROPERTY, "token").with_value(PropertyValue::Token(shader_id.to_string())),
    )?;
    if let Some(shader) = registry.get(shader_id) {
        for property in shader.ports().map(PortTemplate::to_property) {
            doc.create_property(&node_path, property)?;
        }
    }
    Ok(())
}

/// `/Graph1` with two connected adders, a scoped render node, a group, a
/// material holding one shader and an unsupported mesh
pub(crate) fn procedural_document() -> MemoryDocument {
    let operators = create_procedural_registry();
    let shaders = create_shading_registry();
    let mut document = MemoryDocument::new();
    document
        .edit("setup", |doc| {
            doc.create_node(&path("/Graph1"), "Graph")?;
            add_catalog_node(doc, &operators, "/Graph1/Add1", "Add", [0.0, 0.0])?;
            add_catalog_node(doc, &operators, "/Graph1/Add2", "Add", [200.0, 0.0])?;
            doc.add_connection(
                &PropertyPath::new(path("/Graph1/Add2"), "inputs:a"),
                &PropertyPath::new(path("/Graph1/Add1"), "outputs:out"),
            )?;

            doc.create_node(&path("/Graph1/Scope1"), "Scope")?;
            add_catalog_node(doc, &operators, "/Graph1/Scope1/Render1", "Render", [400.0, 0.0])?;

            doc.create_node(&path("/Graph1/Group1"), "Group")?;
            add_catalog_node(doc, &operators, "/Graph1/Group1/Multiply1", "Multiply", [0.0, 0.0])?;

            doc.create_node(&path("/Graph1/Material1"), "Material")?;
            doc.create_property(&path("/Graph1/Material1"), Property::new("outputs:surface", "surface"))?;
            add_shader(doc, &shaders, "/Graph1/Material1/Surface1", "PreviewSurface", [0.0, 0.0])?;
            add_shader(doc, &shaders, "/Graph1/Material1/Texture1", "UVTexture", [-200.0, 0.0])?;

            doc.create_node(&path("/Graph1/Mesh"), "Mesh")
        })
        .unwrap();
    document.clear_history();
    document
}
