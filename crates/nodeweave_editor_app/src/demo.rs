// SPDX-License-Identifier: MIT OR Apache-2.0
//! Demo document used when the editor starts without a file.

use nodeweave_document::adapter::Result;
use nodeweave_document::{
    DocPath, DocumentAdapter, MemoryDocument, NodeMetadata, Property, PropertyPath, PropertyValue,
};
use nodeweave_editor_graph::graphs::procedural::{
    create_procedural_registry, GRAPH_TYPE, GROUP_TYPE, MATERIAL_TYPE, SCOPE_TYPE,
};
use nodeweave_editor_graph::graphs::shading::{create_shading_registry, SHADER_ID_PROPERTY, SHADER_TYPE};
use nodeweave_editor_graph::port::PortTemplate;
use nodeweave_editor_graph::NodeType;

fn path(s: &str) -> Result<DocPath> {
    Ok(DocPath::parse(s)?)
}

fn place(doc: &mut MemoryDocument, node: &DocPath, position: [f32; 2]) -> Result<()> {
    doc.set_metadata(
        node,
        NodeMetadata {
            position,
            ..Default::default()
        },
    )
}

fn add_ports(doc: &mut MemoryDocument, node: &DocPath, node_type: Option<&NodeType>) -> Result<()> {
    for property in node_type.into_iter().flat_map(|t| t.ports()).map(PortTemplate::to_property) {
        doc.create_property(node, property)?;
    }
    Ok(())
}

fn connect(doc: &mut MemoryDocument, target: &str, source: &str) -> Result<()> {
    let parse = |s: &str| -> Result<PropertyPath> {
        let (node, name) = s.split_once('.').unwrap_or((s, ""));
        Ok(PropertyPath::new(path(node)?, name))
    };
    doc.add_connection(&parse(target)?, &parse(source)?)
}

/// A graph with math and scene operators, a group, a scope and a material
/// holding a small shading network
pub fn demo_document() -> Result<MemoryDocument> {
    build_demo(MemoryDocument::new())
}

/// [`demo_document`] keeping at most `undo_depth` undo steps
pub fn demo_document_with_depth(undo_depth: usize) -> Result<MemoryDocument> {
    build_demo(MemoryDocument::with_history_depth(undo_depth))
}

fn build_demo(mut document: MemoryDocument) -> Result<MemoryDocument> {
    let operators = create_procedural_registry();
    let shaders = create_shading_registry();

    document.edit("Create demo", |doc| {
        doc.create_node(&path("/Graph1")?, GRAPH_TYPE)?;

        for (name, type_id, position) in [
            ("Constant1", "Constant", [-220.0, 0.0]),
            ("Add1", "Add", [0.0, 0.0]),
            ("Add2", "Add", [220.0, 0.0]),
            ("Reader1", "SceneReader", [0.0, 160.0]),
            ("Merge1", "Merge", [220.0, 160.0]),
        ] {
            let node = path(&format!("/Graph1/{name}"))?;
            doc.create_node(&node, type_id)?;
            add_ports(doc, &node, operators.get(type_id))?;
            place(doc, &node, position)?;
        }
        connect(doc, "/Graph1/Add1.inputs:a", "/Graph1/Constant1.outputs:out")?;
        connect(doc, "/Graph1/Add2.inputs:a", "/Graph1/Add1.outputs:out")?;
        connect(doc, "/Graph1/Merge1.inputs:in0", "/Graph1/Reader1.outputs:out")?;

        let scope = path("/Graph1/Scope1")?;
        doc.create_node(&scope, SCOPE_TYPE)?;
        let render = path("/Graph1/Scope1/Render1")?;
        doc.create_node(&render, "Render")?;
        add_ports(doc, &render, operators.get("Render"))?;
        place(doc, &render, [440.0, 160.0])?;
        connect(doc, "/Graph1/Scope1/Render1.inputs:in", "/Graph1/Merge1.outputs:out")?;

        let group = path("/Graph1/Group1")?;
        doc.create_node(&group, GROUP_TYPE)?;
        place(doc, &group, [0.0, 320.0])?;
        let multiply = path("/Graph1/Group1/Multiply1")?;
        doc.create_node(&multiply, "Multiply")?;
        add_ports(doc, &multiply, operators.get("Multiply"))?;

        let material = path("/Graph1/Material1")?;
        doc.create_node(&material, MATERIAL_TYPE)?;
        doc.create_property(&material, Property::new("outputs:surface", "surface"))?;
        place(doc, &material, [220.0, 320.0])?;
        for (name, shader_id, position) in [
            ("Surface1", "PreviewSurface", [0.0, 0.0]),
            ("Texture1", "UVTexture", [-240.0, 0.0]),
            ("Coords1", "PrimvarReader_float2", [-480.0, 0.0]),
        ] {
            let node = material.child(name)?;
            doc.create_node(&node, SHADER_TYPE)?;
            doc.create_property(
                &node,
                Property::new(SHADER_ID_PROPERTY, "token").with_value(PropertyValue::Token(shader_id.to_string())),
            )?;
            add_ports(doc, &node, shaders.get(shader_id))?;
            place(doc, &node, position)?;
        }
        connect(doc, "/Graph1/Material1/Surface1.inputs:diffuseColor", "/Graph1/Material1/Texture1.outputs:rgb")?;
        connect(doc, "/Graph1/Material1/Texture1.inputs:st", "/Graph1/Material1/Coords1.outputs:result")?;
        connect(doc, "/Graph1/Material1.outputs:surface", "/Graph1/Material1/Surface1.outputs:surface")?;

        doc.set_terminal(&path("/Graph1")?, Some(&render))?;
        doc.create_node(&path("/Graph1/Mesh1")?, "Mesh")
    })?;

    document.clear_history();
    Ok(document)
}
