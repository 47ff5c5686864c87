//!
//! Import and export of XDMF mesh files.
//!
//! XDMF splits a mesh into light data, an XML document declaring the grid
//! structure, and heavy data, numeric arrays stored either inline as text or
//! in external HDF5 containers referenced from the document. This crate
//! reads version 2 and version 3 documents into a [`Mesh`] value and writes
//! a [`Mesh`] back out as a version 3 document with all arrays inlined.
//!
//! # Examples
//!
//! Read a mesh, then write it back elsewhere:
//!
//! ```no_run
//! let mesh = xdmfio::read("cube.xdmf")?;
//! xdmfio::write(&mesh, "cube_copy.xdmf")?;
//! # Ok::<(), xdmfio::Error>(())
//! ```

pub mod model;
pub mod reader;
pub mod writer;

mod data_item;
mod mixed;
mod xml;

use std::path::Path;

pub use model::{CellBlock, CellType, DataArray, Mesh, ScalarType};

/// Error type for import and export operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The document declares an XDMF major version other than 2 or 3.
    #[error("unsupported XDMF version {0:?}")]
    UnsupportedVersion(String),
    /// The document structure is recognized but not supported, e.g. grid
    /// collections or several domains.
    #[error("unsupported structure: {0}")]
    UnsupportedStructure(String),
    /// The document violates the expected child or attribute layout.
    #[error("malformed document: {0}")]
    MalformedDocument(String),
    /// A declared type name and precision pair is not in the type table.
    #[error("unknown number type ({data_type:?}, precision {precision:?})")]
    UnknownType {
        data_type: String,
        precision: String,
    },
    /// A mixed topology record carries a tag outside the cell type table.
    #[error("unknown cell tag {0} in mixed topology")]
    UnknownCellTag(i64),
    /// A declared topology type name is not in the cell type table.
    #[error("unknown topology type {0:?}")]
    UnknownTopologyName(String),
    /// Only "XYZ" geometries are supported.
    #[error("unsupported geometry type {0:?}")]
    UnsupportedGeometry(String),
    /// Version 3 attributes must declare the type "None".
    #[error("unsupported attribute type {0:?}")]
    UnsupportedAttributeType(String),
    /// The cell type cannot be encoded in a mixed topology.
    #[error("cell type {0} has no mixed topology tag")]
    UnsupportedCellType(CellType),
    /// An array does not match its declared or required dimensions.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),
    /// A mixed topology record would read past the end of its buffer.
    #[error(
        "mixed topology buffer truncated: record at offset {offset} needs \
         {needed} values but the buffer holds {len}"
    )]
    TruncatedBuffer {
        offset: usize,
        needed: usize,
        len: usize,
    },
    /// An external container or an object inside it is absent.
    #[error("not found: {0}")]
    NotFound(String),
    /// A text token cannot be parsed as its declared scalar type.
    #[error("invalid {scalar_type} token {token:?}")]
    ParseError { token: String, scalar_type: ScalarType },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),
    /// HDF5 library error.
    #[cfg(feature = "hdf5")]
    #[error("HDF5 error: {0}")]
    Hdf5(#[from] hdf5::Error),
    /// The document references heavy data but HDF5 support is not enabled.
    #[error("HDF5 support is not enabled")]
    Hdf5Disabled,
}

/// Import an XDMF file at the specified path.
///
/// External heavy data references inside the document are resolved relative
/// to the directory containing the file. To parse in-memory documents use
/// [`reader::parse`].
pub fn read(file_path: impl AsRef<Path>) -> Result<Mesh, Error> {
    let path = file_path.as_ref();
    let contents = std::fs::read_to_string(path)?;
    reader::parse(&contents, path.parent())
}

/// Export a mesh to a pretty printed XDMF file at the specified path.
///
/// The output is always a version 3 document with inlined arrays; see
/// [`writer::write`] to control pretty printing.
pub fn write(mesh: &Mesh, file_path: impl AsRef<Path>) -> Result<(), Error> {
    writer::write(mesh, file_path.as_ref(), true)
}
