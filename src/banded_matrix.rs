/*!
Dense storage for a diagonal band of a conceptually larger matrix.
Only the cells within `bandwidth` of a (possibly shifted) diagonal are stored, everything else reads as 0.

# Example usage
```rust
use quiver_con::banded_matrix::BandedMatrix;

let mut matrix = BandedMatrix::new((4, 4), 1, 0).unwrap();
matrix.set(1, 1, -2.5).unwrap();
assert_eq!(matrix.get(1, 1), -2.5);

// anything outside the band is 0 on read, and an error on write
assert_eq!(matrix.get(3, 0), 0.0);
assert!(matrix.set(3, 0, -1.0).is_err());

// negative indices are end-relative
assert_eq!(matrix.get(-3, -3), -2.5);
```
*/

use std::ops::Range;

/// Failures from the banded storage layer.
/// These are either configuration problems (the shape or band is unusable) or an attempted write outside the band.
#[derive(Clone, Debug, PartialEq)]
pub enum BandedMatrixError {
    /// One of the dimensions was zero
    InvalidShape { rows: usize, cols: usize },
    /// The band does not intersect the rows of a column, the bandwidth is too small for the shape
    EmptyBand { col: usize, start: usize, stop: usize },
    /// A write (or recurrence update) targeted a cell outside of the band
    OutsideBand { row: isize, col: isize },
    /// Two matrices that must share a band height do not
    BandwidthMismatch { expected: usize, found: usize },
    /// A matrix was not centered where the caller needs it
    UnexpectedOffset { expected: isize, found: isize }
}

impl std::fmt::Display for BandedMatrixError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BandedMatrixError::InvalidShape { rows, cols } => write!(f, "Banded matrix requires positive dimensions, but got shape ({rows}, {cols})"),
            BandedMatrixError::EmptyBand { col, start, stop } => write!(f, "Band is empty for column {col} (rows {start}..{stop}), bandwidth is too small for this shape"),
            BandedMatrixError::OutsideBand { row, col } => write!(f, "Update outside bandwidth at ({row}, {col})"),
            BandedMatrixError::BandwidthMismatch { expected, found } => write!(f, "Expected bandwidth {expected}, but found {found}"),
            BandedMatrixError::UnexpectedOffset { expected, found } => write!(f, "Expected band offset {expected}, but found {found}")
        }
    }
}

impl std::error::Error for BandedMatrixError {}

/// Converts a possibly negative index into an absolute one, negative values count from the end of the dimension.
/// Non-negative values are returned unchanged, even if they are past the end.
/// # Arguments
/// * `index` - the requested index
/// * `dim` - the length of the dimension, must be > 0
pub fn wrap_index(index: isize, dim: usize) -> usize {
    if index < 0 {
        index.rem_euclid(dim as isize) as usize
    } else {
        index as usize
    }
}

/// First logical row inside the band for column `j`.
pub fn band_start(j: usize, bandwidth: usize, offset: isize) -> usize {
    (j as isize - bandwidth as isize - offset).max(0) as usize
}

/// One past the last logical row inside the band for column `j`, clipped to `rows`.
pub fn band_stop(j: usize, bandwidth: usize, offset: isize, rows: usize) -> usize {
    (j as isize - offset + bandwidth as isize + 1).clamp(0, rows as isize) as usize
}

/// Physical row holding logical row `i` of column `j`.
/// Only meaningful for cells inside the band, where the result lies in `0..2*bandwidth+1`.
pub fn to_physical_row(i: usize, j: usize, bandwidth: usize, offset: isize) -> usize {
    (i as isize - (j as isize - bandwidth as isize - offset)) as usize
}

/// A banded matrix of `f64` values.
/// Storage is column-major with `2*bandwidth+1` physical rows per column.
#[derive(Clone, Debug, PartialEq)]
pub struct BandedMatrix {
    /// Logical number of rows
    rows: usize,
    /// Logical (and physical) number of columns
    cols: usize,
    /// Half-width of the band
    bandwidth: usize,
    /// Shift applied to the diagonal that the band is centered on
    offset: isize,
    /// Flat column-major buffer
    data: Vec<f64>
}

impl BandedMatrix {
    /// Creates a zero-filled banded matrix.
    /// # Arguments
    /// * `shape` - logical (rows, cols) of the matrix
    /// * `bandwidth` - half-width of the stored band
    /// * `offset` - shift of the band diagonal
    /// # Errors
    /// * if either dimension is zero
    pub fn new(shape: (usize, usize), bandwidth: usize, offset: isize) -> Result<BandedMatrix, BandedMatrixError> {
        let (rows, cols) = shape;
        if rows == 0 || cols == 0 {
            return Err(BandedMatrixError::InvalidShape { rows, cols });
        }
        Ok(BandedMatrix {
            rows,
            cols,
            bandwidth,
            offset,
            data: vec![0.0; (2 * bandwidth + 1) * cols]
        })
    }

    /// Returns the valid logical-row interval for column `j`.
    /// The column does not need to exist physically, this is pure band arithmetic.
    /// # Errors
    /// * if the band does not intersect any row of the column
    pub fn range(&self, j: usize) -> Result<Range<usize>, BandedMatrixError> {
        let (start, stop) = self.bounds(j);
        if start >= stop {
            return Err(BandedMatrixError::EmptyBand { col: j, start, stop });
        }
        Ok(start..stop)
    }

    /// True if logical cell (i, j) is stored.
    pub fn in_band(&self, i: usize, j: usize) -> bool {
        let (start, stop) = self.bounds(j);
        j < self.cols && start <= i && i < stop
    }

    /// Returns the value at (i, j), or 0 if the cell is outside the band.
    /// Negative indices are end-relative.
    pub fn get(&self, i: isize, j: isize) -> f64 {
        let i = wrap_index(i, self.rows);
        let j = wrap_index(j, self.cols);
        if self.in_band(i, j) {
            self.data[self.location(i, j)]
        } else {
            0.0
        }
    }

    /// Sets the value at (i, j).
    /// Negative indices are end-relative.
    /// # Errors
    /// * if the cell is outside the band
    pub fn set(&mut self, i: isize, j: isize, value: f64) -> Result<(), BandedMatrixError> {
        let wi = wrap_index(i, self.rows);
        let wj = wrap_index(j, self.cols);
        if !self.in_band(wi, wj) {
            return Err(BandedMatrixError::OutsideBand { row: i, col: j });
        }
        let loc = self.location(wi, wj);
        self.data[loc] = value;
        Ok(())
    }

    /// Returns the in-band values of column `j`, ordered by ascending row.
    /// # Errors
    /// * if the column does not exist or its band is empty
    pub fn column(&self, j: usize) -> Result<&[f64], BandedMatrixError> {
        if j >= self.cols {
            return Err(BandedMatrixError::OutsideBand { row: 0, col: j as isize });
        }
        let rows = self.range(j)?;
        let base = j * self.band_height();
        let start = base + to_physical_row(rows.start, j, self.bandwidth, self.offset);
        Ok(&self.data[start..(start + rows.len())])
    }

    /// Copies the full physical column `src_col` of `source` into column `dest_col` of this matrix.
    /// Both matrices must share the same bandwidth, the logical meaning of the copied cells depends on the offsets.
    /// # Errors
    /// * if the bandwidths differ
    /// * if either column does not exist
    pub fn copy_column_from(&mut self, dest_col: usize, source: &BandedMatrix, src_col: usize) -> Result<(), BandedMatrixError> {
        if self.bandwidth != source.bandwidth {
            return Err(BandedMatrixError::BandwidthMismatch { expected: self.bandwidth, found: source.bandwidth });
        }
        if dest_col >= self.cols {
            return Err(BandedMatrixError::OutsideBand { row: 0, col: dest_col as isize });
        }
        if src_col >= source.cols {
            return Err(BandedMatrixError::OutsideBand { row: 0, col: src_col as isize });
        }
        let height = self.band_height();
        self.data[dest_col * height..(dest_col + 1) * height]
            .copy_from_slice(&source.data[src_col * height..(src_col + 1) * height]);
        Ok(())
    }

    /// Flips the physical storage along both axes.
    /// Callers are expected to fix up the offset afterwards.
    pub fn reverse(&mut self) {
        self.data.reverse();
    }

    /// Materializes the full matrix with zeros outside the band, mostly for debugging.
    pub fn to_dense(&self) -> Vec<Vec<f64>> {
        let mut dense = vec![vec![0.0; self.cols]; self.rows];
        for j in 0..self.cols {
            let (start, stop) = self.bounds(j);
            for (i, row) in dense.iter_mut().enumerate().take(stop).skip(start) {
                row[j] = self.data[self.location(i, j)];
            }
        }
        dense
    }

    fn bounds(&self, j: usize) -> (usize, usize) {
        (
            band_start(j, self.bandwidth, self.offset),
            band_stop(j, self.bandwidth, self.offset, self.rows)
        )
    }

    fn location(&self, i: usize, j: usize) -> usize {
        j * self.band_height() + to_physical_row(i, j, self.bandwidth, self.offset)
    }

    fn band_height(&self) -> usize {
        2 * self.bandwidth + 1
    }

    // getters
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn bandwidth(&self) -> usize {
        self.bandwidth
    }

    pub fn offset(&self) -> isize {
        self.offset
    }

    pub fn set_offset(&mut self, offset: isize) {
        self.offset = offset;
    }
}
