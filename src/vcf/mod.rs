//! Streaming, lazily-batched VCF ingestion (C4): file opening with
//! transparent gzip/bgzip decompression, header parsing, multi-allelic
//! decomposition, and batch iteration.

pub mod header;
pub mod record;

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use crate::annotation::{self, AnnotationConfig, AnnotationPick};
use crate::err::{LoaderError, LoaderResult};
use crate::info::{self, InfoMap};
use crate::normalize::{self, Normalized};

pub use header::VcfHeader;
pub use record::VcfRecordView;

/// Default number of decomposed variant records per batch handed to
/// downstream QC/loading stages.
pub const DEFAULT_BATCH_SIZE: usize = 10_000;

/// One decomposed, normalized ALT allele of a VCF data line, with its
/// re-sliced INFO values and (if configured) picked annotation.
#[derive(Debug, Clone)]
pub struct DecomposedVariant {
    pub chrom: String,
    pub original_line: u64,
    pub alt_index: usize,
    pub id: Option<String>,
    pub normalized: Normalized,
    pub qual: Option<f64>,
    pub filter: String,
    pub info: InfoMap,
    pub annotation: Option<AnnotationPick>,
    pub format: Option<String>,
    pub sample_count: usize,
    /// Raw, unsplit `FORMAT`-keyed value string for each sample, in header
    /// order; `"."` for a sample column that is entirely missing.
    pub samples: Vec<String>,
}

/// Open a VCF file for reading, transparently decompressing `.gz`/`.bgz`
/// inputs by sniffing the gzip magic bytes rather than trusting the
/// extension.
pub fn open_vcf_reader(path: &Path) -> LoaderResult<Box<dyn BufRead>> {
    let mut file = File::open(path).map_err(|e| {
        LoaderError::InputMalformed {
            line: 0,
            message: format!("cannot open {}: {e}", path.display()),
        }
    })?;

    let mut magic = [0u8; 2];
    let peeked = file.read(&mut magic).map_err(|e| LoaderError::InputMalformed {
        line: 0,
        message: format!("cannot read {}: {e}", path.display()),
    })?;
    let file = File::open(path).map_err(|e| LoaderError::InputMalformed {
        line: 0,
        message: format!("cannot reopen {}: {e}", path.display()),
    })?;

    if peeked == 2 && magic == [0x1f, 0x8b] {
        Ok(Box::new(BufReader::new(flate2::read::MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Drives header parsing followed by decomposed-variant iteration over one
/// VCF source.
pub struct VcfReader<R: BufRead> {
    reader: R,
    pub header: VcfHeader,
    annotation_config: Option<AnnotationConfig>,
    line_no: u64,
    exhausted: bool,
}

impl<R: BufRead> VcfReader<R> {
    /// Consume header lines off `reader` and construct a reader positioned
    /// at the first data line.
    pub fn new(mut reader: R) -> LoaderResult<VcfReader<R>> {
        let mut header_lines = Vec::new();
        loop {
            let mut line = String::new();
            let n = reader.read_line(&mut line).map_err(|e| LoaderError::InputMalformed {
                line: header_lines.len(),
                message: format!("I/O error reading header: {e}"),
            })?;
            if n == 0 {
                return Err(LoaderError::InputMalformed {
                    line: header_lines.len(),
                    message: "VCF file ended before #CHROM header line".to_string(),
                });
            }
            let trimmed = line.trim_end_matches(['\n', '\r']).to_string();
            let is_chrom = trimmed.starts_with("#CHROM");
            header_lines.push(trimmed);
            if is_chrom {
                break;
            }
        }

        let header = VcfHeader::from_lines(header_lines)?;
        let annotation_config = AnnotationConfig::discover(&header.info_descriptions);

        Ok(VcfReader {
            reader,
            header,
            annotation_config,
            line_no: 0,
            exhausted: false,
        })
    }

    /// Read and decompose the next data line. Returns `Ok(None)` at EOF.
    /// A single malformed line is returned as `Err`; callers decide whether
    /// to skip-and-continue or abort per the configured policy.
    pub fn next_record(&mut self) -> LoaderResult<Option<Vec<DecomposedVariant>>> {
        if self.exhausted {
            return Ok(None);
        }

        let mut raw = String::new();
        let n = self.reader.read_line(&mut raw).map_err(|e| LoaderError::InputMalformed {
            line: self.line_no as usize,
            message: format!("I/O error reading data line: {e}"),
        })?;
        if n == 0 {
            self.exhausted = true;
            return Ok(None);
        }
        self.line_no += 1;
        let trimmed = raw.trim_end_matches(['\n', '\r']);
        if trimmed.is_empty() {
            return self.next_record();
        }

        let view = VcfRecordView::parse(trimmed.to_string(), self.line_no as usize)?;
        let info_map = info::parse_info_column(view.info_column(), &self.header.info_decls);
        let alts = normalize::split_alts(view.alt_column());
        let samples: Vec<String> = (0..view.sample_count())
            .map(|i| view.sample_column(i).unwrap_or(".").to_string())
            .collect();

        let mut decomposed = Vec::with_capacity(alts.len());
        for (alt_index, alt) in alts.iter().enumerate() {
            if alt.starts_with('<') || *alt == "*" {
                // Symbolic/spanning-deletion alleles are not normalized;
                // callers that need them can read `view` directly.
                continue;
            }
            let Some(normalized) = normalize::normalize(view.pos, view.r#ref(), alt) else {
                continue;
            };

            let per_alt_info: InfoMap = info_map
                .iter()
                .map(|(k, v)| {
                    let decl_number = self.header.info_decls.get(k).map(|d| d.number);
                    let resliced = match decl_number {
                        Some(crate::info::Cardinality::PerAlt) => info::reslice_per_alt(v, alt_index),
                        Some(crate::info::Cardinality::PerAllele) => {
                            info::reslice_per_allele(v, alt_index)
                        }
                        _ => v.clone(),
                    };
                    (k.clone(), resliced)
                })
                .collect();

            let annotation = self.annotation_config.as_ref().and_then(|cfg| {
                info_map
                    .get(&cfg.info_key)
                    .and_then(|v| v.as_str())
                    .and_then(|raw| annotation::pick_worst_impact(raw, cfg, alt))
            });

            decomposed.push(DecomposedVariant {
                chrom: view.chrom.clone(),
                original_line: self.line_no,
                alt_index,
                id: view.id().map(|s| s.to_string()),
                normalized,
                qual: view.qual(),
                filter: view.filter().to_string(),
                info: per_alt_info,
                annotation,
                format: view.format_column().map(|s| s.to_string()),
                sample_count: view.sample_count(),
                samples: samples.clone(),
            });
        }

        Ok(Some(decomposed))
    }
}

/// Iterate decomposed variants in fixed-size batches, the unit that
/// downstream QC and loading stages operate on.
pub struct BatchIterator<R: BufRead> {
    reader: VcfReader<R>,
    batch_size: usize,
}

impl<R: BufRead> BatchIterator<R> {
    pub fn new(reader: VcfReader<R>, batch_size: usize) -> BatchIterator<R> {
        BatchIterator { reader, batch_size }
    }

    /// Pull the next batch. Returns `Ok(None)` once the underlying source is
    /// exhausted with no pending records; a non-empty, possibly
    /// smaller-than-`batch_size` `Vec` otherwise.
    pub fn next_batch(&mut self) -> LoaderResult<Option<Vec<DecomposedVariant>>> {
        let mut batch = Vec::with_capacity(self.batch_size);
        while batch.len() < self.batch_size {
            match self.reader.next_record()? {
                Some(mut variants) => batch.append(&mut variants),
                None => break,
            }
        }
        if batch.is_empty() {
            Ok(None)
        } else {
            Ok(Some(batch))
        }
    }
}
