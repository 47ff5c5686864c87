//!
//! Codec for the version 3 "Mixed" topology encoding.
//!
//! A mixed buffer is a concatenation of self-describing records with no
//! delimiters. Each record starts with a cell type tag followed by exactly
//! as many node indices as the tagged type requires, so decoding needs the
//! arity table to know where the next record begins.

use ndarray::Array2;

use crate::model::{CellBlock, CellType};
use crate::Error;

/// Decode a flat mixed topology buffer into cell blocks.
///
/// Records are grouped by cell type, preserving the relative order of the
/// records within each group. Blocks appear in the output in the order each
/// tag is first encountered during the scan.
pub(crate) fn decode(buffer: &[i64]) -> Result<Vec<CellBlock>, Error> {
    // Scan pass: record type and start offset of every cell.
    let mut records: Vec<(CellType, usize)> = Vec::new();
    let mut order: Vec<CellType> = Vec::new();
    let mut cursor = 0;
    while cursor < buffer.len() {
        let tag = buffer[cursor];
        let cell_type = CellType::from_mixed_tag(tag).ok_or(Error::UnknownCellTag(tag))?;
        let needed = cell_type.num_nodes() + 1;
        if cursor + needed > buffer.len() {
            return Err(Error::TruncatedBuffer {
                offset: cursor,
                needed,
                len: buffer.len(),
            });
        }
        if !order.contains(&cell_type) {
            order.push(cell_type);
        }
        records.push((cell_type, cursor));
        cursor += needed;
    }

    // Grouping pass: bin the records by type in first-appearance order.
    let mut blocks = Vec::with_capacity(order.len());
    for cell_type in order {
        let num_nodes = cell_type.num_nodes();
        let mut indices = Vec::new();
        let mut num_cells = 0;
        for &(record_type, offset) in &records {
            if record_type != cell_type {
                continue;
            }
            indices.extend_from_slice(&buffer[offset + 1..offset + 1 + num_nodes]);
            num_cells += 1;
        }
        let connectivity = Array2::from_shape_vec((num_cells, num_nodes), indices)
            .map_err(|e| Error::ShapeMismatch(e.to_string()))?;
        blocks.push(CellBlock::new(cell_type, connectivity));
    }
    Ok(blocks)
}

/// Encode cell blocks into a flat mixed topology buffer.
///
/// The buffer holds one record per cell, in block order. The original
/// cross-type interleave of a decoded document is not reconstructed; only
/// the order within each block is preserved.
pub(crate) fn encode(cells: &[CellBlock]) -> Result<Vec<i64>, Error> {
    let total: usize = cells
        .iter()
        .map(|b| (b.cell_type.num_nodes() + 1) * b.num_cells())
        .sum();
    let mut buffer = Vec::with_capacity(total);
    for block in cells {
        let tag = block
            .cell_type
            .mixed_tag()
            .ok_or(Error::UnsupportedCellType(block.cell_type))?;
        for row in block.connectivity.rows() {
            buffer.push(tag);
            buffer.extend(row.iter().copied());
        }
    }
    Ok(buffer)
}
