//! Binary program images.
//!
//! A UE1 program image is nothing but instruction bytes, one per
//! instruction, with no header. The program is as long as the file.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Load a program image from disk.
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<Vec<u8>, ImageError> {
    std::fs::read(path.as_ref()).map_err(|e| ImageError::IoError {
        path: path.as_ref().display().to_string(),
        message: e.to_string(),
    })
}

/// Save a program image to disk, returning the number of bytes written.
pub fn save_image<P: AsRef<Path>>(path: P, bytes: &[u8]) -> Result<usize, ImageError> {
    std::fs::write(path.as_ref(), bytes).map_err(|e| ImageError::IoError {
        path: path.as_ref().display().to_string(),
        message: e.to_string(),
    })?;
    Ok(bytes.len())
}

/// Default image path for a source file: `prog.asm` becomes `prog.bin`.
pub fn bin_path_for<P: AsRef<Path>>(source: P) -> PathBuf {
    source.as_ref().with_extension("bin")
}

fn is_printable(byte: u8) -> bool {
    (32..=126).contains(&byte)
}

fn ascii_column(row: &[u8]) -> String {
    let text: String = row
        .iter()
        .map(|&b| if is_printable(b) { b as char } else { '.' })
        .collect();
    format!("|{}|", text)
}

/// Render bytes in the style of `hexdump -C`.
///
/// Rows hold 16 bytes, split into two groups of 8 by a no-break space,
/// followed by the printable characters of the row. The last line is the
/// total length.
pub fn hexdump(bytes: &[u8]) -> String {
    const NBSP: char = '\u{00A0}';

    let mut out = String::new();

    for (row_index, row) in bytes.chunks(16).enumerate() {
        out.push_str(&format!("{:03X}{} ", row_index * 16, NBSP));

        for (i, byte) in row.iter().enumerate() {
            out.push_str(&format!("{:02X} ", byte));
            if (i + 1) % 8 == 0 {
                out.push(NBSP);
            }
        }

        if row.len() < 16 {
            let missing = 16 - row.len();
            out.push_str(&" ".repeat(missing * 3));
            if missing > 8 {
                // no separator was printed for the first group
                out.push(' ');
            }
            out.push(' ');
        }

        out.push_str(&ascii_column(row));
        out.push('\n');
    }

    out.push_str(&format!("{:03X}\n", bytes.len()));
    out
}

/// Errors that can occur while reading or writing program images.
#[derive(Debug, Clone, Error)]
pub enum ImageError {
    #[error("I/O error on '{path}': {message}")]
    IoError { path: String, message: String },
}
