//! Octave-readable text dumps of matrices and vectors.
//!
//! One value per whitespace-separated token, row-major, twelve significant
//! digits, one matrix row per line. Failing to write a dump is a soft error:
//! callers warn and continue.

use super::real::Real;
use super::tensor::{Matrix, Vector};
use std::io::{self, BufRead, Write};

/// Writes a matrix, one row per line.
///
/// # Errors
///
/// Propagates I/O errors from the writer.
pub fn write_matrix<T: Real, W: Write>(writer: &mut W, matrix: &Matrix<T>) -> io::Result<()> {
    for i in 0..matrix.nrows() {
        for j in 0..matrix.ncols() {
            if j > 0 {
                write!(writer, " ")?;
            }
            write!(writer, "{:.12e}", matrix[(i, j)])?;
        }
        writeln!(writer)?;
    }
    Ok(())
}

/// Writes a vector, one value per line.
///
/// # Errors
///
/// Propagates I/O errors from the writer.
pub fn write_vector<T: Real, W: Write>(writer: &mut W, vector: &Vector<T>) -> io::Result<()> {
    for i in 0..vector.len() {
        writeln!(writer, "{:.12e}", vector[i])?;
    }
    Ok(())
}

/// Reads a matrix written by [`write_matrix`]; the shape is inferred from
/// the line and token structure.
///
/// # Errors
///
/// Returns `InvalidData` on unparsable tokens or ragged rows.
pub fn read_matrix<T: Real, R: BufRead>(reader: &mut R) -> io::Result<Matrix<T>> {
    let rows = read_rows(reader)?;
    let nrows = rows.len();
    let ncols = rows.first().map_or(0, Vec::len);
    if rows.iter().any(|row| row.len() != ncols) {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "ragged rows in matrix dump"));
    }

    let mut matrix = Matrix::zeros(nrows, ncols);
    for (i, row) in rows.iter().enumerate() {
        for (j, &value) in row.iter().enumerate() {
            matrix[(i, j)] = T::from_f64(value);
        }
    }
    Ok(matrix)
}

/// Reads a vector written by [`write_vector`] (any whitespace layout).
///
/// # Errors
///
/// Returns `InvalidData` on unparsable tokens.
pub fn read_vector<T: Real, R: BufRead>(reader: &mut R) -> io::Result<Vector<T>> {
    let rows = read_rows(reader)?;
    Ok(Vector::from_vec(
        rows.into_iter().flatten().map(T::from_f64).collect(),
    ))
}

fn read_rows<R: BufRead>(reader: &mut R) -> io::Result<Vec<Vec<f64>>> {
    let mut rows = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let row = line
            .split_whitespace()
            .map(|token| {
                token
                    .parse::<f64>()
                    .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))
            })
            .collect::<io::Result<Vec<f64>>>()?;
        rows.push(row);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn matrix_roundtrip_within_tolerance() {
        let original = Matrix::from_rows(&[
            vec![1.0_f64 / 3.0, -2.5e-7, std::f64::consts::PI],
            vec![0.0, 1.0e12, -7.25],
        ]);

        let mut buffer = Vec::new();
        write_matrix(&mut buffer, &original).unwrap();
        let reloaded: Matrix<f64> = read_matrix(&mut Cursor::new(buffer)).unwrap();

        assert_eq!(reloaded.nrows(), 2);
        assert_eq!(reloaded.ncols(), 3);
        for j in 0..3 {
            for i in 0..2 {
                let scale = original[(i, j)].abs().max(1.0);
                assert!((reloaded[(i, j)] - original[(i, j)]).abs() < 1e-10 * scale);
            }
        }
    }

    #[test]
    fn vector_roundtrip() {
        let original = Vector::from_vec(vec![1.5_f64, -2.0, 1.0 / 7.0]);

        let mut buffer = Vec::new();
        write_vector(&mut buffer, &original).unwrap();
        let reloaded: Vector<f64> = read_vector(&mut Cursor::new(buffer)).unwrap();

        assert_eq!(reloaded.len(), 3);
        for i in 0..3 {
            assert!((reloaded[i] - original[i]).abs() < 1e-10);
        }
    }

    #[test]
    fn dump_is_one_row_per_line() {
        let matrix = Matrix::from_rows(&[vec![1.0_f64, 2.0], vec![3.0, 4.0]]);
        let mut buffer = Vec::new();
        write_matrix(&mut buffer, &matrix).unwrap();

        let text = String::from_utf8(buffer).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert_eq!(text.lines().next().unwrap().split_whitespace().count(), 2);
    }

    #[test]
    fn malformed_dump_is_invalid_data() {
        let result = read_matrix::<f64, _>(&mut Cursor::new(b"1.0 nope\n".to_vec()));
        assert!(result.is_err());
    }
}
