//! Wave scheduler - partitions steps into batches that may run together

use crate::core::{PipelineError, Step};
use std::collections::{HashMap, HashSet};

/// Steps that run concurrently, in admission order
pub type Wave<'a> = Vec<&'a Step>;

/// Partition `steps` into ordered waves.
///
/// Each pass walks the steps in declaration order and admits a step when it
/// has no input, or its input stream is produced by a step admitted in an
/// earlier wave or earlier in this same pass. A producer directly followed by
/// its consumer therefore shares a wave with it. A consumer declared before
/// its producer waits one extra wave.
///
/// Steps still unadmitted when a pass admits nothing are reported as a
/// scheduling error.
pub fn build_waves(steps: &[Step]) -> Result<Vec<Wave<'_>>, PipelineError> {
    let mut waves = Vec::new();
    let mut available: HashSet<&str> = HashSet::new();
    let mut pending: Vec<&Step> = steps.iter().collect();

    while !pending.is_empty() {
        let mut wave = Vec::new();
        let mut deferred = Vec::new();

        for step in pending {
            let ready = step.input().map_or(true, |input| available.contains(input));
            if ready {
                if let Some(output) = step.output() {
                    available.insert(output);
                }
                wave.push(step);
            } else {
                deferred.push(step);
            }
        }

        if wave.is_empty() {
            return Err(PipelineError::Scheduling(
                deferred.iter().map(|s| s.name.clone()).collect(),
            ));
        }

        waves.push(wave);
        pending = deferred;
    }

    Ok(waves)
}

/// Count, per stream, the consumers that run in a later wave than the
/// stream's producer. Those consumers claim their reader only after the
/// producer may already have finished writing.
pub fn deferred_consumers<'a>(waves: &[Wave<'a>]) -> HashMap<&'a str, usize> {
    let mut produced_in: HashMap<&str, usize> = HashMap::new();
    for (index, wave) in waves.iter().enumerate() {
        for step in wave {
            if let Some(output) = step.output() {
                produced_in.insert(output, index);
            }
        }
    }

    let mut deferred = HashMap::new();
    for (index, wave) in waves.iter().enumerate() {
        for step in wave {
            let Some(input) = step.input() else { continue };
            if produced_in.get(input).is_some_and(|&at| at < index) {
                *deferred.entry(input).or_insert(0) += 1;
            }
        }
    }
    deferred
}

/// Step names per wave, for display and tests
pub fn wave_names(waves: &[Wave<'_>]) -> Vec<Vec<String>> {
    waves
        .iter()
        .map(|wave| wave.iter().map(|s| s.name.clone()).collect())
        .collect()
}
