//!
//! Version-aware XDMF document reader.
//!
//! The two supported major versions share the overall document structure
//! (one `Domain`, one uniform `Grid`, then `Topology`/`Geometry`/`Attribute`
//! sections) but declare types under different attribute names and encode
//! topologies differently: version 2 names a single cell type per grid,
//! version 3 additionally supports the tagged "Mixed" encoding.

use std::collections::BTreeMap;
use std::path::Path;

use log::{debug, warn};
use ndarray::Array2;

use crate::data_item;
use crate::mixed;
use crate::model::{cell_data_from_raw, CellBlock, CellType, DataArray, Mesh};
use crate::xml::{self, Element};
use crate::Error;

/// Parse an XDMF document from a string.
///
/// External heavy data references are resolved against `base_dir`; pass
/// `None` when the source has no directory, in which case resolving an
/// external reference fails with [`Error::NotFound`].
pub fn parse(xml_source: &str, base_dir: Option<&Path>) -> Result<Mesh, Error> {
    let root = xml::parse_str(xml_source)?;
    if root.tag != "Xdmf" {
        return Err(Error::MalformedDocument(format!(
            "expected an <Xdmf> root element, found <{}>",
            root.tag
        )));
    }
    let version = root.req_attrib("Version")?;
    debug!("reading XDMF document, version {}", version);
    match version.split('.').next() {
        Some("2") => read_xdmf2(&root, base_dir),
        Some("3") => read_xdmf3(&root, base_dir),
        _ => Err(Error::UnsupportedVersion(version.to_string())),
    }
}

/// Locate the single uniform grid of the document.
fn uniform_grid(root: &Element) -> Result<&Element, Error> {
    let domain = match root.children.as_slice() {
        [domain] => domain,
        children => {
            return Err(Error::UnsupportedStructure(format!(
                "expected exactly one Domain, found {} top level sections",
                children.len()
            )))
        }
    };
    if domain.tag != "Domain" {
        return Err(Error::MalformedDocument(format!(
            "expected a <Domain>, found <{}>",
            domain.tag
        )));
    }
    let grid = match domain.children.as_slice() {
        [grid] => grid,
        children => {
            return Err(Error::UnsupportedStructure(format!(
                "only a single grid is supported, found {}",
                children.len()
            )))
        }
    };
    if grid.tag != "Grid" {
        return Err(Error::MalformedDocument(format!(
            "expected a <Grid>, found <{}>",
            grid.tag
        )));
    }
    match grid.attrib("GridType") {
        None | Some("Uniform") => Ok(grid),
        Some(other) => Err(Error::UnsupportedStructure(format!(
            "unsupported grid type {:?}",
            other
        ))),
    }
}

/// Get the single DataItem declared inside a grid section.
fn single_data_item(section: &Element) -> Result<&Element, Error> {
    match section.children.as_slice() {
        [item] if item.tag == "DataItem" => Ok(item),
        [other] => Err(Error::MalformedDocument(format!(
            "expected a DataItem inside <{}>, found <{}>",
            section.tag, other.tag
        ))),
        children => Err(Error::MalformedDocument(format!(
            "<{}> must hold exactly one DataItem, found {} children",
            section.tag,
            children.len()
        ))),
    }
}

/// Normalize a resolved topology array into a `[n_cells, num_nodes]` block.
///
/// Heavy data blocks are often stored flat, so a one dimensional array whose
/// length is a multiple of the arity is reshaped.
fn connectivity_block(cell_type: CellType, data: DataArray) -> Result<CellBlock, Error> {
    let num_nodes = cell_type.num_nodes();
    match data.ndim() {
        1 => {}
        2 if data.shape()[1] == num_nodes => {}
        _ => {
            return Err(Error::ShapeMismatch(format!(
                "{} connectivity has shape {:?}, expected [n, {}]",
                cell_type,
                data.shape(),
                num_nodes
            )))
        }
    }
    let indices = data.integer_elements().ok_or_else(|| {
        Error::MalformedDocument(format!(
            "{} connectivity must be integer typed",
            cell_type
        ))
    })?;
    if indices.len() % num_nodes != 0 {
        return Err(Error::ShapeMismatch(format!(
            "{} connectivity holds {} indices, not a multiple of {}",
            cell_type,
            indices.len(),
            num_nodes
        )));
    }
    let num_cells = indices.len() / num_nodes;
    let connectivity = Array2::from_shape_vec((num_cells, num_nodes), indices)
        .map_err(|e| Error::ShapeMismatch(e.to_string()))?;
    Ok(CellBlock::new(cell_type, connectivity))
}

fn duplicate_section(tag: &str) -> Error {
    Error::MalformedDocument(format!("more than one {} section in the grid", tag))
}

/// Assemble the mesh once the grid walk is done.
///
/// Documents without a Topology or Geometry section are accepted; the
/// corresponding mesh fields stay empty.
fn finish_mesh(
    points: Option<DataArray>,
    cells: Vec<CellBlock>,
    point_data: BTreeMap<String, DataArray>,
    cell_data_raw: BTreeMap<String, DataArray>,
) -> Result<Mesh, Error> {
    let cell_data = cell_data_from_raw(&cells, cell_data_raw)?;
    let mesh = Mesh {
        points: points.unwrap_or_else(|| Mesh::default().points),
        cells,
        point_data,
        cell_data,
        field_data: BTreeMap::new(),
    };
    debug!(
        "read mesh with {} points and {} cells in {} blocks",
        mesh.num_points(),
        mesh.num_cells(),
        mesh.cells.len()
    );
    Ok(mesh)
}

fn read_xdmf2(root: &Element, base_dir: Option<&Path>) -> Result<Mesh, Error> {
    let grid = uniform_grid(root)?;

    let mut points = None;
    let mut cells = Vec::new();
    let mut point_data = BTreeMap::new();
    let mut cell_data_raw = BTreeMap::new();
    let mut seen_topology = false;

    for child in &grid.children {
        match child.tag.as_str() {
            "Topology" => {
                if seen_topology {
                    return Err(duplicate_section("Topology"));
                }
                seen_topology = true;
                let cell_type = CellType::from_xdmf_name(child.req_attrib("TopologyType")?)?;
                let data = data_item::resolve(single_data_item(child)?, "NumberType", base_dir)?;
                cells.push(connectivity_block(cell_type, data)?);
            }
            "Geometry" => {
                if points.is_some() {
                    return Err(duplicate_section("Geometry"));
                }
                match child.req_attrib("GeometryType")? {
                    "XYZ" => {}
                    other => return Err(Error::UnsupportedGeometry(other.to_string())),
                }
                points = Some(data_item::resolve(
                    single_data_item(child)?,
                    "NumberType",
                    base_dir,
                )?);
            }
            "Attribute" => {
                let name = child.req_attrib("Name")?.to_string();
                let data = data_item::resolve(single_data_item(child)?, "NumberType", base_dir)?;
                match child.req_attrib("Center")? {
                    "Node" => {
                        point_data.insert(name, data);
                    }
                    "Cell" => {
                        cell_data_raw.insert(name, data);
                    }
                    "Grid" => {
                        warn!("ignoring grid centered attribute {:?}", name);
                    }
                    other => {
                        return Err(Error::MalformedDocument(format!(
                            "unsupported attribute center {:?}",
                            other
                        )))
                    }
                }
            }
            other => {
                return Err(Error::MalformedDocument(format!(
                    "unknown section <{}>",
                    other
                )))
            }
        }
    }

    finish_mesh(points, cells, point_data, cell_data_raw)
}

fn read_xdmf3(root: &Element, base_dir: Option<&Path>) -> Result<Mesh, Error> {
    let grid = uniform_grid(root)?;

    let mut points = None;
    let mut cells = Vec::new();
    let mut point_data = BTreeMap::new();
    let mut cell_data_raw = BTreeMap::new();
    let mut seen_topology = false;

    for child in &grid.children {
        match child.tag.as_str() {
            "Topology" => {
                if seen_topology {
                    return Err(duplicate_section("Topology"));
                }
                seen_topology = true;
                let topology_type = child.req_attrib("Type")?.to_string();
                let data = data_item::resolve(single_data_item(child)?, "DataType", base_dir)?;
                if topology_type == "Mixed" {
                    let buffer = data.integer_elements().ok_or_else(|| {
                        Error::MalformedDocument(
                            "mixed connectivity must be integer typed".into(),
                        )
                    })?;
                    cells = mixed::decode(&buffer)?;
                } else {
                    let cell_type = CellType::from_xdmf_name(&topology_type)?;
                    cells.push(connectivity_block(cell_type, data)?);
                }
            }
            "Geometry" => {
                if points.is_some() {
                    return Err(duplicate_section("Geometry"));
                }
                match child.req_attrib("Type")? {
                    "XYZ" => {}
                    other => return Err(Error::UnsupportedGeometry(other.to_string())),
                }
                points = Some(data_item::resolve(
                    single_data_item(child)?,
                    "DataType",
                    base_dir,
                )?);
            }
            "Attribute" => {
                match child.req_attrib("Type")? {
                    "None" => {}
                    other => return Err(Error::UnsupportedAttributeType(other.to_string())),
                }
                let name = child.req_attrib("Name")?.to_string();
                let data = data_item::resolve(single_data_item(child)?, "DataType", base_dir)?;
                match child.req_attrib("Center")? {
                    "Node" => {
                        point_data.insert(name, data);
                    }
                    "Cell" => {
                        cell_data_raw.insert(name, data);
                    }
                    other => {
                        return Err(Error::MalformedDocument(format!(
                            "unsupported attribute center {:?}",
                            other
                        )))
                    }
                }
            }
            other => {
                return Err(Error::MalformedDocument(format!(
                    "unknown section <{}>",
                    other
                )))
            }
        }
    }

    finish_mesh(points, cells, point_data, cell_data_raw)
}
