//! VCF header parsing: `##INFO`/`##FORMAT` declarations and the `#CHROM`
//! sample-column header.

use std::collections::HashMap;

use crate::info::{Cardinality, FieldDecl};

/// Everything extracted from the `##`/`#CHROM` header block before the
/// first data record.
#[derive(Debug, Clone, Default)]
pub struct VcfHeader {
    pub raw_lines: Vec<String>,
    pub info_decls: HashMap<String, FieldDecl>,
    pub format_decls: HashMap<String, FieldDecl>,
    pub info_descriptions: HashMap<String, String>,
    pub samples: Vec<String>,
}

fn parse_structured_line(line: &str) -> Option<HashMap<String, String>> {
    let inner = line.find('<')?;
    let close = line.rfind('>')?;
    if close <= inner {
        return None;
    }
    let body = &line[inner + 1..close];

    let mut fields = HashMap::new();
    let mut rest = body;
    while !rest.is_empty() {
        let eq = rest.find('=')?;
        let key = rest[..eq].trim().to_string();
        rest = &rest[eq + 1..];
        let value = if rest.starts_with('"') {
            let end = rest[1..].find('"').map(|i| i + 1)?;
            let v = rest[1..end].to_string();
            rest = rest[end + 1..].trim_start_matches(',').trim_start();
            v
        } else {
            let end = rest.find(',').unwrap_or(rest.len());
            let v = rest[..end].trim().to_string();
            rest = if end < rest.len() { rest[end + 1..].trim_start() } else { "" };
            v
        };
        fields.insert(key, value);
    }
    Some(fields)
}

fn parse_field_decl(fields: &HashMap<String, String>) -> Option<FieldDecl> {
    Some(FieldDecl {
        id: fields.get("ID")?.clone(),
        number: Cardinality::from_header_str(fields.get("Number").map(|s| s.as_str()).unwrap_or("1")),
        ty: fields.get("Type").cloned().unwrap_or_default(),
        description: fields.get("Description").cloned().unwrap_or_default(),
    })
}

impl VcfHeader {
    /// Consume header lines (including the `#CHROM...` line) one at a time,
    /// building up declarations. Call `finish` is implicit: once the
    /// `#CHROM` line is seen the header is complete.
    pub fn from_lines<I: IntoIterator<Item = String>>(lines: I) -> crate::err::LoaderResult<VcfHeader> {
        let mut header = VcfHeader::default();

        for line in lines {
            if line.starts_with("#CHROM") {
                header.samples = Self::parse_chrom_line(&line)?;
                header.raw_lines.push(line);
                return Ok(header);
            }
            if !line.starts_with("##") {
                continue;
            }
            header.raw_lines.push(line.clone());

            if let Some(rest) = line.strip_prefix("##INFO=") {
                if let Some(fields) = parse_structured_line(rest) {
                    if let Some(decl) = parse_field_decl(&fields) {
                        header.info_descriptions.insert(decl.id.clone(), decl.description.clone());
                        header.info_decls.insert(decl.id.clone(), decl);
                    }
                }
            } else if let Some(rest) = line.strip_prefix("##FORMAT=") {
                if let Some(fields) = parse_structured_line(rest) {
                    if let Some(decl) = parse_field_decl(&fields) {
                        header.format_decls.insert(decl.id.clone(), decl);
                    }
                }
            }
        }

        Err(crate::err::LoaderError::InputMalformed {
            line: header.raw_lines.len(),
            message: "VCF file ended before #CHROM header line".to_string(),
        }
        .into())
    }

    fn parse_chrom_line(line: &str) -> crate::err::LoaderResult<Vec<String>> {
        let cols: Vec<&str> = line.split('\t').collect();
        if cols.len() < 8 {
            return Err(crate::err::LoaderError::InputMalformed {
                line: 0,
                message: format!("#CHROM header has only {} columns, expected at least 8", cols.len()),
            }
            .into());
        }
        if cols.len() == 8 {
            return Ok(Vec::new());
        }
        // cols[8] is FORMAT, samples start at index 9.
        Ok(cols[9..].iter().map(|s| s.to_string()).collect())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn sample_header() -> Vec<String> {
        vec![
            "##fileformat=VCFv4.2".to_string(),
            r#"##INFO=<ID=AF,Number=A,Type=Float,Description="Allele Frequency">"#.to_string(),
            r#"##INFO=<ID=DB,Number=0,Type=Flag,Description="dbSNP membership">"#.to_string(),
            r#"##FORMAT=<ID=GT,Number=1,Type=String,Description="Genotype">"#.to_string(),
            r#"##FORMAT=<ID=AD,Number=R,Type=Integer,Description="Allelic depths">"#.to_string(),
            "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tNA001\tNA002".to_string(),
        ]
    }

    #[test]
    fn parses_info_and_format_decls() {
        let header = VcfHeader::from_lines(sample_header()).unwrap();
        assert_eq!(header.info_decls.len(), 2);
        assert_eq!(header.format_decls.len(), 2);
        assert_eq!(header.samples, vec!["NA001".to_string(), "NA002".to_string()]);
        assert!(matches!(
            header.info_decls.get("AF").unwrap().number,
            Cardinality::PerAlt
        ));
    }

    #[test]
    fn no_samples_is_valid() {
        let lines = vec![
            "##fileformat=VCFv4.2".to_string(),
            "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO".to_string(),
        ];
        let header = VcfHeader::from_lines(lines).unwrap();
        assert!(header.samples.is_empty());
    }

    #[test]
    fn missing_chrom_line_is_malformed() {
        let lines = vec!["##fileformat=VCFv4.2".to_string()];
        assert!(VcfHeader::from_lines(lines).is_err());
    }

    #[test]
    fn description_with_commas_inside_quotes_is_not_split() {
        let lines = vec![
            r#"##INFO=<ID=CSQ,Number=.,Type=String,Description="Format: Allele|Consequence|IMPACT, with extras">"#.to_string(),
            "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO".to_string(),
        ];
        let header = VcfHeader::from_lines(lines).unwrap();
        assert!(header.info_descriptions.get("CSQ").unwrap().contains("IMPACT, with extras"));
    }
}
