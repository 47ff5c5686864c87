//!
//! Resolution of DataItem array declarations into in-memory arrays.
//!
//! A DataItem either carries its values inline as whitespace separated text
//! or points at a block of heavy data inside an HDF5 container addressed as
//! `"container.h5:/internal/path"`. The container path is resolved relative
//! to the directory of the document being read.

use std::path::Path;
use std::str::FromStr;

#[cfg(feature = "hdf5")]
use log::debug;
use ndarray::{ArrayD, IxDyn};

use crate::model::{DataArray, ScalarType};
use crate::xml::Element;
use crate::Error;

/// Resolve a DataItem element into a typed array.
///
/// `dt_key` names the attribute carrying the declared type name, which
/// differs between the two document versions (`"NumberType"` in version 2,
/// `"DataType"` in version 3). External references are resolved against
/// `base_dir`; resolving one from a source with no base directory fails with
/// [`Error::NotFound`].
pub(crate) fn resolve(
    item: &Element,
    dt_key: &str,
    base_dir: Option<&Path>,
) -> Result<DataArray, Error> {
    let dims = parse_dims(item.req_attrib("Dimensions")?)?;
    let scalar_type = ScalarType::from_xdmf(item.req_attrib(dt_key)?, item.req_attrib("Precision")?)?;
    match item.req_attrib("Format")? {
        "XML" => parse_inline(item.text.trim(), scalar_type, &dims),
        "HDF" => read_external(item.text.trim(), base_dir, &dims),
        other => Err(Error::MalformedDocument(format!(
            "unknown DataItem format {:?}",
            other
        ))),
    }
}

fn parse_dims(dimensions: &str) -> Result<Vec<usize>, Error> {
    let dims = dimensions
        .split_ascii_whitespace()
        .map(|token| {
            token.parse::<usize>().map_err(|_| {
                Error::MalformedDocument(format!("invalid Dimensions entry {:?}", token))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    if dims.is_empty() {
        return Err(Error::MalformedDocument(
            "DataItem declares empty Dimensions".into(),
        ));
    }
    Ok(dims)
}

fn parse_tokens<T: FromStr>(
    text: &str,
    scalar_type: ScalarType,
    dims: &[usize],
) -> Result<ArrayD<T>, Error> {
    let mut values = Vec::new();
    for token in text.split_ascii_whitespace() {
        values.push(token.parse::<T>().map_err(|_| Error::ParseError {
            token: token.to_string(),
            scalar_type,
        })?);
    }
    let expected: usize = dims.iter().product();
    if values.len() != expected {
        return Err(Error::ShapeMismatch(format!(
            "DataItem holds {} values but Dimensions {:?} require {}",
            values.len(),
            dims,
            expected
        )));
    }
    ArrayD::from_shape_vec(IxDyn(dims), values).map_err(|e| Error::ShapeMismatch(e.to_string()))
}

fn parse_inline(text: &str, scalar_type: ScalarType, dims: &[usize]) -> Result<DataArray, Error> {
    Ok(match scalar_type {
        ScalarType::I32 => DataArray::I32(parse_tokens(text, scalar_type, dims)?),
        ScalarType::I64 => DataArray::I64(parse_tokens(text, scalar_type, dims)?),
        ScalarType::F32 => DataArray::F32(parse_tokens(text, scalar_type, dims)?),
        ScalarType::F64 => DataArray::F64(parse_tokens(text, scalar_type, dims)?),
    })
}

/// Split an external address into its container and internal paths.
fn split_address(address: &str) -> Result<(&str, &str), Error> {
    let (container, internal) = address.split_once(':').ok_or_else(|| {
        Error::MalformedDocument(format!(
            "external DataItem address {:?} is missing the ':' separator",
            address
        ))
    })?;
    if !internal.starts_with('/') {
        return Err(Error::MalformedDocument(format!(
            "internal path {:?} must start with '/'",
            internal
        )));
    }
    Ok((container, internal))
}

#[cfg(feature = "hdf5")]
fn read_external(
    address: &str,
    base_dir: Option<&Path>,
    declared_dims: &[usize],
) -> Result<DataArray, Error> {
    let (container, internal) = split_address(address)?;
    let base = base_dir.ok_or_else(|| {
        Error::NotFound(format!(
            "container {:?} cannot be resolved without a document directory",
            container
        ))
    })?;
    let container_path = base.join(container);
    if !container_path.is_file() {
        return Err(Error::NotFound(format!(
            "heavy data container {}",
            container_path.display()
        )));
    }
    debug!("reading {:?} from {}", internal, container_path.display());

    // Opened read-only for the duration of this call.
    let file = hdf5::File::open(&container_path)?;
    let segments: Vec<&str> = internal[1..].split('/').collect();
    let (leaf, groups) = segments.split_last().ok_or_else(|| {
        Error::NotFound(format!("empty internal path in {:?}", address))
    })?;
    let mut group = file.group("/")?;
    for segment in groups {
        group = group.group(segment).map_err(|_| {
            Error::NotFound(format!(
                "group {:?} in {}",
                segment,
                container_path.display()
            ))
        })?;
    }
    let dataset = group.dataset(leaf).map_err(|_| {
        Error::NotFound(format!("dataset {:?} in {}", leaf, container_path.display()))
    })?;

    // The stored shape and type are authoritative; the declared attributes
    // are not re-validated against them.
    let stored = dataset.shape();
    if stored != declared_dims {
        debug!(
            "stored shape {:?} of {:?} overrides declared Dimensions {:?}",
            stored, internal, declared_dims
        );
    }
    read_dataset(&dataset)
}

#[cfg(feature = "hdf5")]
fn read_dataset(dataset: &hdf5::Dataset) -> Result<DataArray, Error> {
    use hdf5::types::{FloatSize, IntSize, TypeDescriptor};

    let descriptor = dataset.dtype()?.to_descriptor()?;
    Ok(match descriptor {
        TypeDescriptor::Integer(IntSize::U4) => DataArray::I32(dataset.read_dyn::<i32>()?),
        TypeDescriptor::Integer(IntSize::U8) => DataArray::I64(dataset.read_dyn::<i64>()?),
        TypeDescriptor::Float(FloatSize::U4) => DataArray::F32(dataset.read_dyn::<f32>()?),
        TypeDescriptor::Float(FloatSize::U8) => DataArray::F64(dataset.read_dyn::<f64>()?),
        other => {
            return Err(Error::UnknownType {
                data_type: format!("{:?}", other),
                precision: String::new(),
            })
        }
    })
}

#[cfg(not(feature = "hdf5"))]
fn read_external(
    address: &str,
    _base_dir: Option<&Path>,
    _declared_dims: &[usize],
) -> Result<DataArray, Error> {
    // Malformed addresses are rejected before the missing feature is
    // reported.
    let _ = split_address(address)?;
    Err(Error::Hdf5Disabled)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inline_item(dims: &str, data_type: &str, precision: &str, text: &str) -> Element {
        Element::new("DataItem")
            .with_attrib("DataType", data_type)
            .with_attrib("Dimensions", dims)
            .with_attrib("Format", "XML")
            .with_attrib("Precision", precision)
            .with_text(text)
    }

    #[test]
    fn inline_reshapes_row_major() {
        let item = inline_item("2 2", "Int", "4", "1 2 3 4");
        let data = resolve(&item, "DataType", None).unwrap();
        assert_eq!(
            data,
            DataArray::I32(ndarray::arr2(&[[1, 2], [3, 4]]).into_dyn())
        );
    }

    #[test]
    fn inline_token_count_must_match_dimensions() {
        let item = inline_item("5", "Int", "4", "1 2 3 4");
        assert!(matches!(
            resolve(&item, "DataType", None),
            Err(Error::ShapeMismatch(_))
        ));
    }

    #[test]
    fn inline_bad_token_is_a_parse_error() {
        let item = inline_item("3", "Float", "8", "1.0 nope 3.0");
        match resolve(&item, "DataType", None) {
            Err(Error::ParseError { token, scalar_type }) => {
                assert_eq!(token, "nope");
                assert_eq!(scalar_type, ScalarType::F64);
            }
            other => panic!("expected a parse error, got {:?}", other),
        }
    }

    #[test]
    fn inline_float_tokens_are_not_integers() {
        let item = inline_item("2", "Int", "8", "1.5 2.5");
        assert!(matches!(
            resolve(&item, "DataType", None),
            Err(Error::ParseError { .. })
        ));
    }

    #[test]
    fn unknown_type_pair_is_rejected() {
        let item = inline_item("2", "Int", "2", "1 2");
        assert!(matches!(
            resolve(&item, "DataType", None),
            Err(Error::UnknownType { .. })
        ));
    }

    #[test]
    fn version2_items_declare_number_type() {
        let item = Element::new("DataItem")
            .with_attrib("NumberType", "Float")
            .with_attrib("Dimensions", "2")
            .with_attrib("Format", "XML")
            .with_attrib("Precision", "4")
            .with_text("0.5 1.5");
        let data = resolve(&item, "NumberType", None).unwrap();
        assert_eq!(data, DataArray::from(vec![0.5f32, 1.5]));
        assert!(matches!(
            resolve(&item, "DataType", None),
            Err(Error::MalformedDocument(_))
        ));
    }

    #[test]
    fn unknown_format_is_malformed() {
        let item = Element::new("DataItem")
            .with_attrib("DataType", "Int")
            .with_attrib("Dimensions", "1")
            .with_attrib("Format", "Binary")
            .with_attrib("Precision", "4")
            .with_text("1");
        assert!(matches!(
            resolve(&item, "DataType", None),
            Err(Error::MalformedDocument(_))
        ));
    }

    #[test]
    fn external_address_must_hold_separator_and_absolute_path() {
        assert!(matches!(
            split_address("data.h5"),
            Err(Error::MalformedDocument(_))
        ));
        assert!(matches!(
            split_address("data.h5:a/b"),
            Err(Error::MalformedDocument(_))
        ));
        assert_eq!(split_address("data.h5:/a/b").unwrap(), ("data.h5", "/a/b"));
    }

    #[cfg(feature = "hdf5")]
    #[test]
    fn external_without_base_dir_is_not_found() {
        let item = Element::new("DataItem")
            .with_attrib("DataType", "Float")
            .with_attrib("Dimensions", "4")
            .with_attrib("Format", "HDF")
            .with_attrib("Precision", "8")
            .with_text("data.h5:/a/b");
        assert!(matches!(
            resolve(&item, "DataType", None),
            Err(Error::NotFound(_))
        ));
    }
}
