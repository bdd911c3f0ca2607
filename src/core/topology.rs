//! Topology analysis - pure predicates over a pipeline's shape

use crate::core::Pipeline;
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

/// Archive, compression and transfer utilities that move bulk data
const DATA_MOVEMENT_VERBS: &[&str] = &[
    "tar", "zip", "unzip", "gzip", "gunzip", "zcat", "bzip2", "bunzip2", "xz", "unxz", "zstd",
    "lz4", "7z", "pigz", "rsync", "scp", "sftp", "ftp", "curl", "wget", "nc", "netcat", "socat",
    "dd", "pv",
];

/// A verb as the leading word, or after whitespace, a pipe or a semicolon
static VERB_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    let verbs = DATA_MOVEMENT_VERBS.join("|");
    Regex::new(&format!(r"(?:^|[\s|;])(?:{verbs})(?:$|[\s|;&])"))
        .expect("data movement verb pattern is valid")
});

/// URLs and well-known bulk data mount points
static BULK_DATA_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:(?:https?|ftp|sftp|s3|gs|az)://|/(?:data|mnt|backups?|volumes)/)")
        .expect("bulk data pattern is valid")
});

/// True when the pipeline can be written as one left-to-right pipe chain.
///
/// Any stream with more than one consumer rules it out. An output that does
/// not feed the very next step must still be consumed by some later step.
pub fn is_simple_linear(pipeline: &Pipeline) -> bool {
    let steps = &pipeline.steps;
    if steps.len() <= 1 {
        return true;
    }

    let mut consumers: HashMap<&str, usize> = HashMap::new();
    for input in steps.iter().filter_map(|s| s.input()) {
        *consumers.entry(input).or_default() += 1;
    }
    if consumers.values().any(|&count| count > 1) {
        return false;
    }

    for (index, step) in steps.iter().enumerate() {
        let Some(output) = step.output() else {
            continue;
        };
        let feeds_next = steps
            .get(index + 1)
            .is_some_and(|next| next.input() == Some(output));
        if feeds_next {
            continue;
        }
        let consumed_later = steps[index + 1..]
            .iter()
            .any(|later| later.input() == Some(output));
        if !consumed_later {
            return false;
        }
    }

    true
}

/// Heuristic: does any step move bulk data (archives, transfers, URLs)?
pub fn requires_progress(pipeline: &Pipeline) -> bool {
    pipeline.steps.iter().any(|step| {
        VERB_PATTERN.is_match(&step.command) || BULK_DATA_PATTERN.is_match(&step.command)
    })
}

/// Read-only summary of the analysis, used by `validate` output
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct TopologyReport {
    pub linear: bool,
    pub requires_progress: bool,
}

impl TopologyReport {
    pub fn analyze(pipeline: &Pipeline) -> Self {
        Self {
            linear: is_simple_linear(pipeline),
            requires_progress: requires_progress(pipeline),
        }
    }
}
