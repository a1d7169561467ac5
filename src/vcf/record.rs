//! Zero-copy VCF data-line view: only CHROM/POS are parsed eagerly, every
//! other column is sliced lazily from the owned line buffer.

use memchr::memchr;

use crate::err::{LoaderError, LoaderResult};

/// A single VCF data line, tab-boundary-indexed but otherwise unparsed.
pub struct VcfRecordView {
    line: String,
    field_bounds: Vec<(usize, usize)>,
    pub chrom: String,
    pub pos: u64,
}

impl VcfRecordView {
    /// Parse one data line's tab boundaries and its CHROM/POS columns.
    pub fn parse(line: String, line_no: usize) -> LoaderResult<VcfRecordView> {
        if line.is_empty() {
            return Err(LoaderError::InputMalformed {
                line: line_no,
                message: "empty data line".to_string(),
            });
        }

        let bytes = line.as_bytes();
        let mut field_bounds = Vec::with_capacity(10);
        let mut start = 0usize;
        loop {
            match memchr(b'\t', &bytes[start..]) {
                Some(rel) => {
                    field_bounds.push((start, start + rel));
                    start += rel + 1;
                }
                None => {
                    field_bounds.push((start, bytes.len()));
                    break;
                }
            }
        }

        if field_bounds.len() < 8 {
            return Err(LoaderError::InputMalformed {
                line: line_no,
                message: format!("expected at least 8 columns, found {}", field_bounds.len()),
            });
        }

        let chrom = line[field_bounds[0].0..field_bounds[0].1].to_string();
        let pos_str = &line[field_bounds[1].0..field_bounds[1].1];
        let pos: u64 = pos_str.parse().map_err(|_| LoaderError::InputMalformed {
            line: line_no,
            message: format!("non-numeric POS {pos_str:?}"),
        })?;

        Ok(VcfRecordView {
            line,
            field_bounds,
            chrom,
            pos,
        })
    }

    fn field(&self, index: usize) -> Option<&str> {
        self.field_bounds
            .get(index)
            .map(|&(s, e)| &self.line[s..e])
    }

    pub fn field_count(&self) -> usize {
        self.field_bounds.len()
    }

    pub fn id(&self) -> Option<&str> {
        self.field(2).filter(|s| *s != ".")
    }

    pub fn r#ref(&self) -> &str {
        self.field(3).unwrap_or("")
    }

    pub fn alt_column(&self) -> &str {
        self.field(4).unwrap_or("")
    }

    pub fn qual(&self) -> Option<f64> {
        self.field(5).and_then(|s| s.parse().ok())
    }

    pub fn filter(&self) -> &str {
        self.field(6).unwrap_or(".")
    }

    pub fn info_column(&self) -> &str {
        self.field(7).unwrap_or(".")
    }

    pub fn format_column(&self) -> Option<&str> {
        self.field(8)
    }

    /// The raw, unsplit text of the given 0-based sample column (index 0 is
    /// the first sample after FORMAT).
    pub fn sample_column(&self, sample_index: usize) -> Option<&str> {
        self.field(9 + sample_index)
    }

    pub fn sample_count(&self) -> usize {
        self.field_bounds.len().saturating_sub(9)
    }
}
