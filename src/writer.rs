//!
//! XDMF document writer.
//!
//! Output is always a version 3 document with every array inlined as text;
//! heavy data containers are read but never written. Meshes with a single
//! cell type get a plain named topology, meshes with several types are
//! packed into a "Mixed" topology.

use std::path::Path;

use log::warn;
use ndarray::ArrayD;

use crate::mixed;
use crate::model::{raw_from_cell_data, DataArray, Mesh};
use crate::xml::{self, Element};
use crate::Error;

/// Write a mesh to an XDMF file at the given path.
pub fn write(mesh: &Mesh, file_path: &Path, pretty: bool) -> Result<(), Error> {
    let tree = build_document(mesh)?;
    xml::write_file(&tree, file_path, pretty)
}

/// Assemble the version 3 document tree for a mesh.
pub(crate) fn build_document(mesh: &Mesh) -> Result<Element, Error> {
    if !mesh.field_data.is_empty() {
        warn!(
            "field data is not represented in XDMF output, dropping {} entries",
            mesh.field_data.len()
        );
    }

    let mut grid = Element::new("Grid").with_attrib("Name", "Grid");

    grid = grid.with_child(
        Element::new("Geometry")
            .with_attrib("Origin", "")
            .with_attrib("Type", "XYZ")
            .with_child(data_item_element(&mesh.points)),
    );

    if mesh.cells.len() == 1 {
        let block = &mesh.cells[0];
        let connectivity = DataArray::from(block.connectivity.clone());
        grid = grid.with_child(
            Element::new("Topology")
                .with_attrib("Type", block.cell_type.xdmf_name())
                .with_child(data_item_element(&connectivity)),
        );
    } else if mesh.cells.len() > 1 {
        let buffer = DataArray::from(mixed::encode(&mesh.cells)?);
        grid = grid.with_child(
            Element::new("Topology")
                .with_attrib("Type", "Mixed")
                .with_child(data_item_element(&buffer)),
        );
    }

    for (name, data) in &mesh.point_data {
        grid = grid.with_child(attribute_element(name, data, "Node"));
    }
    for (name, data) in &raw_from_cell_data(&mesh.cell_data, &mesh.cells)? {
        grid = grid.with_child(attribute_element(name, data, "Cell"));
    }

    Ok(Element::new("Xdmf")
        .with_attrib("Version", "3.0")
        .with_child(Element::new("Domain").with_child(grid)))
}

fn attribute_element(name: &str, data: &DataArray, center: &str) -> Element {
    Element::new("Attribute")
        .with_attrib("Name", name)
        .with_attrib("Type", "None")
        .with_attrib("Center", center)
        .with_child(data_item_element(data))
}

fn data_item_element(data: &DataArray) -> Element {
    let (data_type, precision) = data.scalar_type().xdmf_descriptor();
    let dimensions = data
        .shape()
        .iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join(" ");
    Element::new("DataItem")
        .with_attrib("DataType", data_type)
        .with_attrib("Dimensions", dimensions)
        .with_attrib("Format", "XML")
        .with_attrib("Precision", precision)
        .with_text(render_text(data))
}

/// Render array values as text, one row per line for 2-D data.
///
/// Floating data is written with fifteen fractional digits in scientific
/// notation, index data in plain decimal.
fn render_text(data: &DataArray) -> String {
    match data {
        DataArray::I32(a) => render_rows(a, |x| x.to_string()),
        DataArray::I64(a) => render_rows(a, |x| x.to_string()),
        DataArray::F32(a) => render_rows(a, |x| format!("{:.15e}", x)),
        DataArray::F64(a) => render_rows(a, |x| format!("{:.15e}", x)),
    }
}

fn render_rows<T>(a: &ArrayD<T>, fmt: impl Fn(&T) -> String) -> String {
    let row_len = if a.ndim() >= 2 {
        a.shape()[a.ndim() - 1].max(1)
    } else {
        1
    };
    let mut lines = Vec::new();
    let mut row = Vec::with_capacity(row_len);
    for value in a.iter() {
        row.push(fmt(value));
        if row.len() == row_len {
            lines.push(row.join(" "));
            row.clear();
        }
    }
    if !row.is_empty() {
        lines.push(row.join(" "));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CellBlock, CellType};
    use ndarray::arr2;

    fn data_item_text(grid: &Element, section: &str) -> String {
        let section = grid
            .children
            .iter()
            .find(|c| c.tag == section)
            .expect("section present");
        section.children[0].text.clone()
    }

    #[test]
    fn single_type_mesh_uses_named_topology() {
        let mesh = Mesh {
            points: DataArray::from(arr2(&[[0.0f64, 0.0, 0.0], [1.0, 0.0, 0.0]])),
            cells: vec![CellBlock::new(CellType::Line3, arr2(&[[0i64, 1, 0]]))],
            ..Default::default()
        };
        let tree = build_document(&mesh).unwrap();
        assert_eq!(tree.attrib("Version"), Some("3.0"));
        let grid = &tree.children[0].children[0];
        let topology = grid.children.iter().find(|c| c.tag == "Topology").unwrap();
        assert_eq!(topology.attrib("Type"), Some("Edge_3"));
        let item = &topology.children[0];
        assert_eq!(item.attrib("Dimensions"), Some("1 3"));
        assert_eq!(item.attrib("DataType"), Some("Int"));
        assert_eq!(item.attrib("Precision"), Some("8"));
    }

    #[test]
    fn multi_type_mesh_uses_mixed_topology() {
        let mesh = Mesh {
            points: DataArray::from(arr2(&[
                [0.0f64, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [1.0, 1.0, 0.0],
                [0.0, 1.0, 0.0],
            ])),
            cells: vec![
                CellBlock::new(CellType::Triangle, arr2(&[[0i64, 1, 2]])),
                CellBlock::new(CellType::Quad, arr2(&[[0i64, 1, 2, 3]])),
            ],
            ..Default::default()
        };
        let tree = build_document(&mesh).unwrap();
        let grid = &tree.children[0].children[0];
        let topology = grid.children.iter().find(|c| c.tag == "Topology").unwrap();
        assert_eq!(topology.attrib("Type"), Some("Mixed"));
        // One record of 4 values and one of 5.
        assert_eq!(topology.children[0].attrib("Dimensions"), Some("9"));
        let tokens: Vec<i64> = data_item_text(grid, "Topology")
            .split_ascii_whitespace()
            .map(|t| t.parse().unwrap())
            .collect();
        assert_eq!(tokens, vec![4, 0, 1, 2, 5, 0, 1, 2, 3]);
    }

    #[test]
    fn empty_mesh_has_no_topology_section() {
        let tree = build_document(&Mesh::default()).unwrap();
        let grid = &tree.children[0].children[0];
        assert!(grid.children.iter().all(|c| c.tag != "Topology"));
        let geometry = grid.children.iter().find(|c| c.tag == "Geometry").unwrap();
        assert_eq!(geometry.children[0].attrib("Dimensions"), Some("0 3"));
    }

    #[test]
    fn floats_render_in_scientific_notation() {
        let text = render_text(&DataArray::from(vec![0.5f64, 1.0]));
        assert_eq!(
            text,
            "5.000000000000000e-1\n1.000000000000000e0"
        );
    }

    #[test]
    fn rows_render_one_per_line() {
        let text = render_text(&DataArray::from(arr2(&[[1i64, 2], [3, 4]])));
        assert_eq!(text, "1 2\n3 4");
    }
}
