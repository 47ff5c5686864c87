use std::collections::BTreeMap;
use std::fmt;

use ndarray::{concatenate, Array1, Array2, ArrayD, Axis, IxDyn, Slice};

use crate::Error;

/**
 * XDMF Mesh Data Model
 */

/// Model of an unstructured mesh exchanged through XDMF files.
///
/// A `Mesh` is constructed wholesale by the reader and consumed wholesale by
/// the writer. It has no identity of its own beyond the data it carries.
#[derive(Clone, PartialEq, Debug)]
pub struct Mesh {
    /// Point coordinates as a `[n_points, dim]` array.
    pub points: DataArray,
    /// Cell connectivity grouped by cell type.
    ///
    /// The order of the blocks is preserved from the source document and is
    /// visible again when the mesh is re-encoded as a "Mixed" topology.
    pub cells: Vec<CellBlock>,
    /// Data attached to points. The leading dimension of each array equals
    /// the number of points.
    pub point_data: BTreeMap<String, DataArray>,
    /// Data attached to cells in structured form. Each entry holds one array
    /// per cell block, aligned with `cells`.
    pub cell_data: BTreeMap<String, Vec<DataArray>>,
    /// Grid-scoped data carried opaquely.
    ///
    /// XDMF documents read by this crate never populate this field and the
    /// writer does not emit it. It exists so the mesh value can carry such
    /// data between other producers and consumers.
    pub field_data: BTreeMap<String, DataArray>,
}

impl Default for Mesh {
    fn default() -> Mesh {
        Mesh {
            points: DataArray::F64(ArrayD::zeros(IxDyn(&[0, 3]))),
            cells: Vec::new(),
            point_data: BTreeMap::new(),
            cell_data: BTreeMap::new(),
            field_data: BTreeMap::new(),
        }
    }
}

impl Mesh {
    /// Number of points in the mesh.
    pub fn num_points(&self) -> usize {
        self.points.rows()
    }

    /// Total number of cells among all cell blocks.
    pub fn num_cells(&self) -> usize {
        self.cells.iter().map(|b| b.num_cells()).sum()
    }
}

/// A group of cells sharing one topological type.
#[derive(Clone, PartialEq, Debug)]
pub struct CellBlock {
    pub cell_type: CellType,
    /// Node indices as a `[n_cells, num_nodes(cell_type)]` array.
    pub connectivity: Array2<i64>,
}

impl CellBlock {
    pub fn new(cell_type: CellType, connectivity: Array2<i64>) -> CellBlock {
        CellBlock {
            cell_type,
            connectivity,
        }
    }

    /// Number of cells in this block.
    pub fn num_cells(&self) -> usize {
        self.connectivity.nrows()
    }
}

/// A typed array loaded from either inline text or heavy data.
#[derive(Clone, PartialEq, Debug)]
pub enum DataArray {
    /// Array of signed integers `i32`.
    I32(ArrayD<i32>),
    /// Array of signed long integers `i64`.
    I64(ArrayD<i64>),
    /// Array of single precision floats.
    F32(ArrayD<f32>),
    /// Array of double precision floats.
    F64(ArrayD<f64>),
}

impl Default for DataArray {
    fn default() -> DataArray {
        DataArray::F64(ArrayD::zeros(IxDyn(&[0])))
    }
}

/// Evaluate the expression `$e` given the array `$a` stored in a `DataArray`.
#[macro_export]
macro_rules! match_data {
    ($data:expr; $a:pat => $e:expr) => {
        match $data {
            DataArray::I32($a) => $e,
            DataArray::I64($a) => $e,
            DataArray::F32($a) => $e,
            DataArray::F64($a) => $e,
        }
    };
}

macro_rules! impl_data_array_convert {
    ($t:ident => $v:ident) => {
        impl From<ArrayD<$t>> for DataArray {
            fn from(a: ArrayD<$t>) -> DataArray {
                DataArray::$v(a)
            }
        }

        impl From<Array2<$t>> for DataArray {
            fn from(a: Array2<$t>) -> DataArray {
                DataArray::$v(a.into_dyn())
            }
        }

        impl From<Array1<$t>> for DataArray {
            fn from(a: Array1<$t>) -> DataArray {
                DataArray::$v(a.into_dyn())
            }
        }

        impl From<Vec<$t>> for DataArray {
            fn from(v: Vec<$t>) -> DataArray {
                DataArray::$v(Array1::from_vec(v).into_dyn())
            }
        }
    };
}

impl_data_array_convert!(i32 => I32);
impl_data_array_convert!(i64 => I64);
impl_data_array_convert!(f32 => F32);
impl_data_array_convert!(f64 => F64);

impl DataArray {
    /// Get the scalar type stored by this array.
    pub fn scalar_type(&self) -> ScalarType {
        match self {
            DataArray::I32(_) => ScalarType::I32,
            DataArray::I64(_) => ScalarType::I64,
            DataArray::F32(_) => ScalarType::F32,
            DataArray::F64(_) => ScalarType::F64,
        }
    }

    /// Shape of the array.
    pub fn shape(&self) -> &[usize] {
        match_data!(self; a => a.shape())
    }

    /// Number of dimensions.
    pub fn ndim(&self) -> usize {
        match_data!(self; a => a.ndim())
    }

    /// Total number of elements.
    pub fn len(&self) -> usize {
        match_data!(self; a => a.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of entries along the leading axis.
    pub fn rows(&self) -> usize {
        self.shape().first().copied().unwrap_or(0)
    }

    /// Flatten an integer array into `i64` elements in row-major order.
    ///
    /// Returns `None` for floating point arrays.
    pub fn integer_elements(&self) -> Option<Vec<i64>> {
        match self {
            DataArray::I32(a) => Some(a.iter().map(|&x| i64::from(x)).collect()),
            DataArray::I64(a) => Some(a.iter().copied().collect()),
            DataArray::F32(_) | DataArray::F64(_) => None,
        }
    }

    /// Split the array along the leading axis into consecutive pieces of the
    /// given row counts.
    ///
    /// The counts must add up to the number of rows in this array.
    pub fn split_rows(&self, counts: &[usize]) -> Result<Vec<DataArray>, Error> {
        let total: usize = counts.iter().sum();
        if self.rows() != total {
            return Err(Error::ShapeMismatch(format!(
                "array with {} rows cannot be split into blocks of {:?} rows",
                self.rows(),
                counts
            )));
        }
        match_data!(self; a => {
            let mut pieces = Vec::with_capacity(counts.len());
            let mut start = 0;
            for &n in counts {
                let piece = a
                    .slice_axis(Axis(0), Slice::from(start..start + n))
                    .to_owned();
                pieces.push(DataArray::from(piece));
                start += n;
            }
            Ok(pieces)
        })
    }

    /// Concatenate arrays of the same scalar type along the leading axis.
    pub fn concat_rows(pieces: &[DataArray]) -> Result<DataArray, Error> {
        macro_rules! concat_as {
            ($v:ident) => {{
                let views = pieces
                    .iter()
                    .map(|p| match p {
                        DataArray::$v(a) => Ok(a.view()),
                        other => Err(Error::ShapeMismatch(format!(
                            "cannot concatenate {} data with {} data",
                            ScalarType::$v,
                            other.scalar_type()
                        ))),
                    })
                    .collect::<Result<Vec<_>, Error>>()?;
                concatenate(Axis(0), &views)
                    .map(DataArray::from)
                    .map_err(|e| Error::ShapeMismatch(e.to_string()))
            }};
        }

        match pieces.first() {
            None => Err(Error::ShapeMismatch(
                "cannot concatenate an empty list of arrays".into(),
            )),
            Some(DataArray::I32(_)) => concat_as!(I32),
            Some(DataArray::I64(_)) => concat_as!(I64),
            Some(DataArray::F32(_)) => concat_as!(F32),
            Some(DataArray::F64(_)) => concat_as!(F64),
        }
    }
}

/// Convert raw cell data, one flat array spanning all cell blocks in document
/// order, into the structured per-block form stored on [`Mesh`].
pub fn cell_data_from_raw(
    cells: &[CellBlock],
    raw: BTreeMap<String, DataArray>,
) -> Result<BTreeMap<String, Vec<DataArray>>, Error> {
    let counts: Vec<usize> = cells.iter().map(|b| b.num_cells()).collect();
    raw.into_iter()
        .map(|(name, data)| {
            let blocks = data.split_rows(&counts).map_err(|e| {
                Error::ShapeMismatch(format!("cell data {:?} does not fit the mesh: {}", name, e))
            })?;
            Ok((name, blocks))
        })
        .collect()
}

/// Convert structured cell data back into the raw form written to documents.
pub fn raw_from_cell_data(
    cell_data: &BTreeMap<String, Vec<DataArray>>,
    cells: &[CellBlock],
) -> Result<BTreeMap<String, DataArray>, Error> {
    let mut raw = BTreeMap::new();
    for (name, blocks) in cell_data {
        if blocks.len() != cells.len() {
            return Err(Error::ShapeMismatch(format!(
                "cell data {:?} holds {} blocks but the mesh has {} cell blocks",
                name,
                blocks.len(),
                cells.len()
            )));
        }
        for (piece, cell_block) in blocks.iter().zip(cells) {
            if piece.rows() != cell_block.num_cells() {
                return Err(Error::ShapeMismatch(format!(
                    "cell data {:?} holds {} entries for a {} block of {} cells",
                    name,
                    piece.rows(),
                    cell_block.cell_type,
                    cell_block.num_cells()
                )));
            }
        }
        raw.insert(name.clone(), DataArray::concat_rows(blocks)?);
    }
    Ok(raw)
}

/// Scalar types representable in XDMF array declarations.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum ScalarType {
    /// Data is interpreted as `i32` (signed 32 bit) integers.
    I32,
    /// Data is interpreted as `i64` (signed 64 bit) integers.
    I64,
    /// Data is interpreted as `f32` (single precision) floats.
    F32,
    /// Data is interpreted as `f64` (double precision) floats.
    F64,
}

impl ScalarType {
    /// Look up the scalar type declared by an XDMF type name and precision
    /// attribute pair.
    pub fn from_xdmf(data_type: &str, precision: &str) -> Result<ScalarType, Error> {
        match (data_type, precision) {
            ("Int", "4") => Ok(ScalarType::I32),
            ("Int", "8") => Ok(ScalarType::I64),
            ("Float", "4") => Ok(ScalarType::F32),
            ("Float", "8") => Ok(ScalarType::F64),
            _ => Err(Error::UnknownType {
                data_type: data_type.to_string(),
                precision: precision.to_string(),
            }),
        }
    }

    /// The XDMF type name and precision pair declaring this scalar type.
    pub fn xdmf_descriptor(self) -> (&'static str, &'static str) {
        match self {
            ScalarType::I32 => ("Int", "4"),
            ScalarType::I64 => ("Int", "8"),
            ScalarType::F32 => ("Float", "4"),
            ScalarType::F64 => ("Float", "8"),
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let (name, precision) = self.xdmf_descriptor();
        write!(f, "{}{}", name, precision)
    }
}

/// This enum describes the types of cells representable by XDMF files.
///
/// Linear types also appear in version 3 "Mixed" topologies under small
/// integer tags. Quadratic types other than [`CellType::Triangle6`] are only
/// reachable through string-named single-type topologies.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum CellType {
    Vertex,
    Line3,
    Triangle,
    Triangle6,
    Quad,
    Quad8,
    Tetra,
    Tetra10,
    Pyramid,
    Pyramid13,
    Wedge,
    Wedge15,
    Hexahedron,
    Hexahedron20,
}

impl CellType {
    /// Look up a cell type from its tag in a "Mixed" topology buffer.
    pub fn from_mixed_tag(tag: i64) -> Option<CellType> {
        Some(match tag {
            1 => CellType::Vertex,
            4 => CellType::Triangle,
            5 => CellType::Quad,
            6 => CellType::Tetra,
            7 => CellType::Pyramid,
            8 => CellType::Wedge,
            9 => CellType::Hexahedron,
            11 => CellType::Triangle6,
            _ => return None,
        })
    }

    /// The tag identifying this cell type in a "Mixed" topology buffer, if it
    /// has one.
    pub fn mixed_tag(self) -> Option<i64> {
        Some(match self {
            CellType::Vertex => 1,
            CellType::Triangle => 4,
            CellType::Quad => 5,
            CellType::Tetra => 6,
            CellType::Pyramid => 7,
            CellType::Wedge => 8,
            CellType::Hexahedron => 9,
            CellType::Triangle6 => 11,
            _ => return None,
        })
    }

    /// Look up a cell type from its XDMF topology type name.
    pub fn from_xdmf_name(name: &str) -> Result<CellType, Error> {
        Ok(match name {
            "Polyvertex" => CellType::Vertex,
            "Edge_3" => CellType::Line3,
            "Triangle" => CellType::Triangle,
            "Tri_6" => CellType::Triangle6,
            "Quadrilateral" => CellType::Quad,
            "Quad_8" => CellType::Quad8,
            "Tetrahedron" => CellType::Tetra,
            "Tet_10" => CellType::Tetra10,
            "Pyramid" => CellType::Pyramid,
            "Pyramid_13" => CellType::Pyramid13,
            "Wedge" => CellType::Wedge,
            "Wedge_15" => CellType::Wedge15,
            "Hexahedron" => CellType::Hexahedron,
            "Hex_20" => CellType::Hexahedron20,
            _ => return Err(Error::UnknownTopologyName(name.to_string())),
        })
    }

    /// The XDMF topology type name of this cell type.
    pub fn xdmf_name(self) -> &'static str {
        match self {
            CellType::Vertex => "Polyvertex",
            CellType::Line3 => "Edge_3",
            CellType::Triangle => "Triangle",
            CellType::Triangle6 => "Tri_6",
            CellType::Quad => "Quadrilateral",
            CellType::Quad8 => "Quad_8",
            CellType::Tetra => "Tetrahedron",
            CellType::Tetra10 => "Tet_10",
            CellType::Pyramid => "Pyramid",
            CellType::Pyramid13 => "Pyramid_13",
            CellType::Wedge => "Wedge",
            CellType::Wedge15 => "Wedge_15",
            CellType::Hexahedron => "Hexahedron",
            CellType::Hexahedron20 => "Hex_20",
        }
    }

    /// Number of node indices per cell of this type.
    pub fn num_nodes(self) -> usize {
        match self {
            CellType::Vertex => 1,
            CellType::Line3 => 3,
            CellType::Triangle => 3,
            CellType::Triangle6 => 6,
            CellType::Quad => 4,
            CellType::Quad8 => 8,
            CellType::Tetra => 4,
            CellType::Tetra10 => 10,
            CellType::Pyramid => 5,
            CellType::Pyramid13 => 13,
            CellType::Wedge => 6,
            CellType::Wedge15 => 15,
            CellType::Hexahedron => 8,
            CellType::Hexahedron20 => 20,
        }
    }

    #[cfg(test)]
    fn all() -> [CellType; 14] {
        [
            CellType::Vertex,
            CellType::Line3,
            CellType::Triangle,
            CellType::Triangle6,
            CellType::Quad,
            CellType::Quad8,
            CellType::Tetra,
            CellType::Tetra10,
            CellType::Pyramid,
            CellType::Pyramid13,
            CellType::Wedge,
            CellType::Wedge15,
            CellType::Hexahedron,
            CellType::Hexahedron20,
        ]
    }
}

impl fmt::Display for CellType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            CellType::Vertex => "vertex",
            CellType::Line3 => "line3",
            CellType::Triangle => "triangle",
            CellType::Triangle6 => "triangle6",
            CellType::Quad => "quad",
            CellType::Quad8 => "quad8",
            CellType::Tetra => "tetra",
            CellType::Tetra10 => "tetra10",
            CellType::Pyramid => "pyramid",
            CellType::Pyramid13 => "pyramid13",
            CellType::Wedge => "wedge",
            CellType::Wedge15 => "wedge15",
            CellType::Hexahedron => "hexahedron",
            CellType::Hexahedron20 => "hexahedron20",
        };
        write!(f, "{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    #[test]
    fn scalar_type_table_bijection() {
        for st in [
            ScalarType::I32,
            ScalarType::I64,
            ScalarType::F32,
            ScalarType::F64,
        ] {
            let (name, precision) = st.xdmf_descriptor();
            assert_eq!(ScalarType::from_xdmf(name, precision).unwrap(), st);
        }
        assert!(matches!(
            ScalarType::from_xdmf("Int", "2"),
            Err(Error::UnknownType { .. })
        ));
        assert!(matches!(
            ScalarType::from_xdmf("UChar", "1"),
            Err(Error::UnknownType { .. })
        ));
    }

    #[test]
    fn cell_type_name_table_bijection() {
        for ct in CellType::all() {
            assert_eq!(CellType::from_xdmf_name(ct.xdmf_name()).unwrap(), ct);
        }
        assert!(matches!(
            CellType::from_xdmf_name("Polygon"),
            Err(Error::UnknownTopologyName(_))
        ));
    }

    #[test]
    fn mixed_tag_table_bijection() {
        for ct in CellType::all() {
            if let Some(tag) = ct.mixed_tag() {
                assert_eq!(CellType::from_mixed_tag(tag), Some(ct));
            }
        }
        assert_eq!(CellType::from_mixed_tag(2), None);
        assert_eq!(CellType::from_mixed_tag(10), None);
    }

    #[test]
    fn cell_type_arities() {
        assert_eq!(CellType::Vertex.num_nodes(), 1);
        assert_eq!(CellType::Triangle.num_nodes(), 3);
        assert_eq!(CellType::Triangle6.num_nodes(), 6);
        assert_eq!(CellType::Quad.num_nodes(), 4);
        assert_eq!(CellType::Tetra.num_nodes(), 4);
        assert_eq!(CellType::Pyramid.num_nodes(), 5);
        assert_eq!(CellType::Wedge.num_nodes(), 6);
        assert_eq!(CellType::Hexahedron.num_nodes(), 8);
    }

    #[test]
    fn split_and_concat_rows() {
        let data = DataArray::from(vec![1.0f64, 2.0, 3.0, 4.0, 5.0]);
        let pieces = data.split_rows(&[2, 3]).unwrap();
        assert_eq!(pieces[0], DataArray::from(vec![1.0f64, 2.0]));
        assert_eq!(pieces[1], DataArray::from(vec![3.0f64, 4.0, 5.0]));
        assert_eq!(DataArray::concat_rows(&pieces).unwrap(), data);

        assert!(matches!(
            data.split_rows(&[2, 2]),
            Err(Error::ShapeMismatch(_))
        ));
    }

    #[test]
    fn concat_rejects_mixed_scalar_types() {
        let pieces = [
            DataArray::from(vec![1.0f64, 2.0]),
            DataArray::from(vec![1i64, 2]),
        ];
        assert!(matches!(
            DataArray::concat_rows(&pieces),
            Err(Error::ShapeMismatch(_))
        ));
    }

    #[test]
    fn cell_data_round_trip() {
        let cells = vec![
            CellBlock::new(CellType::Triangle, arr2(&[[0i64, 1, 2], [1, 2, 3]])),
            CellBlock::new(CellType::Quad, arr2(&[[0i64, 1, 2, 3]])),
        ];
        let mut raw = BTreeMap::new();
        raw.insert(
            "quality".to_string(),
            DataArray::from(vec![0.5f64, 1.5, 2.5]),
        );

        let structured = cell_data_from_raw(&cells, raw.clone()).unwrap();
        assert_eq!(
            structured["quality"],
            vec![
                DataArray::from(vec![0.5f64, 1.5]),
                DataArray::from(vec![2.5f64]),
            ]
        );

        let back = raw_from_cell_data(&structured, &cells).unwrap();
        assert_eq!(back, raw);
    }

    #[test]
    fn cell_data_rejects_misaligned_raw() {
        let cells = vec![CellBlock::new(CellType::Triangle, arr2(&[[0i64, 1, 2]]))];
        let mut raw = BTreeMap::new();
        raw.insert("u".to_string(), DataArray::from(vec![0.5f64, 1.5]));
        assert!(matches!(
            cell_data_from_raw(&cells, raw),
            Err(Error::ShapeMismatch(_))
        ));
    }

    #[test]
    fn integer_elements_row_major() {
        let data = DataArray::from(arr2(&[[1i32, 2], [3, 4]]).into_dyn());
        assert_eq!(data.integer_elements(), Some(vec![1i64, 2, 3, 4]));
        assert_eq!(DataArray::from(vec![1.0f32]).integer_elements(), None);
    }
}
