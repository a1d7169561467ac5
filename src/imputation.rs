//! Detection of imputation-tool provenance and per-variant imputation
//! quality metrics from VCF header and INFO content (C3).

/// Which imputation tool produced a VCF, detected from header metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum ImputationTool {
    #[strum(serialize = "minimac4")]
    Minimac4,
    #[strum(serialize = "beagle")]
    Beagle,
    #[strum(serialize = "impute2")]
    Impute2,
}

/// The INFO key carrying each tool's primary quality metric, and the
/// substrings in `##source`/`##command` header lines that identify it.
struct ToolSignature {
    tool: ImputationTool,
    header_needles: &'static [&'static str],
    info_key: &'static str,
}

const SIGNATURES: &[ToolSignature] = &[
    ToolSignature {
        tool: ImputationTool::Minimac4,
        header_needles: &["minimac4", "Minimac4", "minimac3"],
        info_key: "R2",
    },
    ToolSignature {
        tool: ImputationTool::Beagle,
        header_needles: &["beagle", "Beagle"],
        info_key: "DR2",
    },
    ToolSignature {
        tool: ImputationTool::Impute2,
        header_needles: &["impute2", "IMPUTE2"],
        info_key: "INFO",
    },
];

/// Detect the imputation tool from the raw `##` header lines of a VCF, by
/// scanning `##source=`/`##command=`/`##contig`-adjacent free-text lines for
/// a recognized tool name. Returns `None` when no signature matches.
pub fn detect_tool(header_lines: &[String]) -> Option<ImputationTool> {
    for line in header_lines {
        if !line.starts_with("##") {
            continue;
        }
        for sig in SIGNATURES {
            if sig.header_needles.iter().any(|needle| line.contains(needle)) {
                return Some(sig.tool);
            }
        }
    }
    None
}

/// Name of the INFO key holding the tool's imputation quality score.
pub fn quality_info_key(tool: ImputationTool) -> &'static str {
    SIGNATURES
        .iter()
        .find(|sig| sig.tool == tool)
        .map(|sig| sig.info_key)
        .expect("every ImputationTool has a signature")
}

/// Extract the imputation quality score (`R2`, `DR2`, or `INFO` depending on
/// tool) for a variant from its already-parsed INFO map.
pub fn extract_quality(
    tool: ImputationTool,
    info: &std::collections::HashMap<String, crate::info::InfoValue>,
) -> Option<f64> {
    info.get(quality_info_key(tool)).and_then(|v| v.as_f64())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::info::InfoValue;
    use std::collections::HashMap;

    #[rstest::rstest]
    #[case(vec!["##source=Minimac4.1.7.3".to_string()], Some(ImputationTool::Minimac4))]
    #[case(vec!["##source=beagle.28Jun21.220.jar".to_string()], Some(ImputationTool::Beagle))]
    #[case(vec!["##command=impute2 -m map.txt".to_string()], Some(ImputationTool::Impute2))]
    #[case(vec!["##fileformat=VCFv4.2".to_string()], None)]
    fn detect_tool_from_header(
        #[case] header: Vec<String>,
        #[case] expected: Option<ImputationTool>,
    ) {
        assert_eq!(detect_tool(&header), expected);
    }

    #[test]
    fn quality_key_per_tool() {
        assert_eq!(quality_info_key(ImputationTool::Minimac4), "R2");
        assert_eq!(quality_info_key(ImputationTool::Beagle), "DR2");
        assert_eq!(quality_info_key(ImputationTool::Impute2), "INFO");
    }

    #[test]
    fn extract_quality_reads_mapped_key() {
        let mut info = HashMap::new();
        info.insert("R2".to_string(), InfoValue::Float(0.87));
        assert_eq!(extract_quality(ImputationTool::Minimac4, &info), Some(0.87));
        assert_eq!(extract_quality(ImputationTool::Beagle, &info), None);
    }
}
