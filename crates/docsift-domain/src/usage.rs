//! Token usage records and the usage accumulator

use crate::result::AggregateResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How much of a usage record the provider actually reported
///
/// Providers may omit usage entirely or report only some counters. The flag
/// travels with the record so downstream consumers can distinguish a genuine
/// zero-cost call from a call whose cost is simply unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageAvailability {
    /// All counters were reported (or total was derived from the other two)
    Reported,
    /// Some counters were missing; missing fields default to zero
    PartiallyReported,
    /// The provider omitted usage entirely; all counters are zero
    Unreported,
}

/// Provider-reported token cost for one call, or a sum of such records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Tokens in the prompt
    pub prompt_tokens: u64,

    /// Tokens in the completion
    pub completion_tokens: u64,

    /// Total tokens used
    pub total_tokens: u64,

    /// Provider-specific prompt token breakdown (e.g. cached tokens)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_tokens_details: Option<BTreeMap<String, f64>>,

    /// Provider-specific completion token breakdown (e.g. reasoning tokens)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_tokens_details: Option<BTreeMap<String, f64>>,

    /// Whether the counters above were actually reported
    pub availability: UsageAvailability,
}

impl TokenUsage {
    /// Create a fully-reported record from prompt and completion counts
    pub fn reported(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
            prompt_tokens_details: None,
            completion_tokens_details: None,
            availability: UsageAvailability::Reported,
        }
    }

    /// Create a record for a call whose provider omitted usage entirely
    pub fn unreported() -> Self {
        Self {
            prompt_tokens: 0,
            completion_tokens: 0,
            total_tokens: 0,
            prompt_tokens_details: None,
            completion_tokens_details: None,
            availability: UsageAvailability::Unreported,
        }
    }

    /// Normalize raw provider counters into a usage record
    ///
    /// Missing counters default to zero and mark the record partially
    /// reported. A missing total is derived from `prompt + completion`; a
    /// reported total that disagrees with that sum is kept as reported and
    /// the record is flagged partial.
    pub fn from_counters(
        prompt_tokens: Option<u64>,
        completion_tokens: Option<u64>,
        total_tokens: Option<u64>,
    ) -> Self {
        if prompt_tokens.is_none() && completion_tokens.is_none() && total_tokens.is_none() {
            return Self::unreported();
        }

        let both_present = prompt_tokens.is_some() && completion_tokens.is_some();
        let prompt = prompt_tokens.unwrap_or(0);
        let completion = completion_tokens.unwrap_or(0);

        let (total, consistent) = match total_tokens {
            Some(t) => (t, t == prompt + completion),
            None => (prompt + completion, true),
        };

        let availability = if both_present && consistent {
            UsageAvailability::Reported
        } else {
            UsageAvailability::PartiallyReported
        };

        Self {
            prompt_tokens: prompt,
            completion_tokens: completion,
            total_tokens: total,
            prompt_tokens_details: None,
            completion_tokens_details: None,
            availability,
        }
    }

    /// Attach a prompt token breakdown
    pub fn with_prompt_details(mut self, details: BTreeMap<String, f64>) -> Self {
        self.prompt_tokens_details = Some(details);
        self
    }

    /// Attach a completion token breakdown
    pub fn with_completion_details(mut self, details: BTreeMap<String, f64>) -> Self {
        self.completion_tokens_details = Some(details);
        self
    }

    /// True when the provider omitted usage entirely
    pub fn is_unreported(&self) -> bool {
        self.availability == UsageAvailability::Unreported
    }
}

/// Sum an ordered sequence of per-chunk usage records into one aggregate
///
/// Pure and order-independent: the field-wise sum over present records is
/// identical for any permutation of the input, and re-running over the same
/// records yields an identical aggregate. The caller keeps the ordered
/// sequence itself for audit; this function never consumes or reorders it.
///
/// An empty or fully-absent input yields zero counters with the
/// `Unreported` flag set. Any absent record, or any record that was itself
/// only partially reported, degrades the aggregate to `PartiallyReported`.
pub fn accumulate<'a, I>(records: I) -> TokenUsage
where
    I: IntoIterator<Item = Option<&'a TokenUsage>>,
{
    let mut present = 0usize;
    let mut absent = 0usize;
    let mut degraded = false;
    let mut sum = TokenUsage::unreported();

    for record in records {
        match record {
            None => absent += 1,
            Some(usage) => {
                present += 1;
                if usage.availability != UsageAvailability::Reported {
                    degraded = true;
                }
                sum.prompt_tokens += usage.prompt_tokens;
                sum.completion_tokens += usage.completion_tokens;
                sum.total_tokens += usage.total_tokens;
                merge_details(&mut sum.prompt_tokens_details, &usage.prompt_tokens_details);
                merge_details(
                    &mut sum.completion_tokens_details,
                    &usage.completion_tokens_details,
                );
            }
        }
    }

    if present == 0 {
        return TokenUsage::unreported();
    }

    sum.availability = if absent > 0 || degraded {
        UsageAvailability::PartiallyReported
    } else {
        UsageAvailability::Reported
    };
    sum
}

/// Key-wise sum of an optional details map into an accumulator
fn merge_details(into: &mut Option<BTreeMap<String, f64>>, from: &Option<BTreeMap<String, f64>>) {
    if let Some(details) = from {
        let target = into.get_or_insert_with(BTreeMap::new);
        for (key, value) in details {
            *target.entry(key.clone()).or_insert(0.0) += value;
        }
    }
}

/// One chunk's usage counters as exposed on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkUsage {
    /// Tokens in the prompt
    pub prompt_tokens: u64,
    /// Tokens in the completion
    pub completion_tokens: u64,
    /// Total tokens used
    pub total_tokens: u64,
}

/// Aggregate usage plus the per-chunk breakdown, as exposed on the wire
///
/// Absent from responses entirely when the aggregate is unreported, so
/// callers never mistake an unknown cost for a free one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsageReport {
    /// Summed prompt tokens across chunks with usage present
    pub prompt_tokens: u64,
    /// Summed completion tokens across chunks with usage present
    pub completion_tokens: u64,
    /// Summed total tokens across chunks with usage present
    pub total_tokens: u64,
    /// Per-chunk counters, in chunk order, for chunks that reported usage
    pub chunks: Vec<ChunkUsage>,
}

impl TokenUsageReport {
    /// Build the wire report for an aggregate result
    ///
    /// Returns `None` when no chunk reported usage.
    pub fn from_aggregate(aggregate: &AggregateResult) -> Option<Self> {
        if aggregate.usage.is_unreported() {
            return None;
        }

        let chunks = aggregate
            .chunks
            .iter()
            .filter_map(|chunk| chunk.usage.as_ref())
            .map(|usage| ChunkUsage {
                prompt_tokens: usage.prompt_tokens,
                completion_tokens: usage.completion_tokens,
                total_tokens: usage.total_tokens,
            })
            .collect();

        Some(Self {
            prompt_tokens: aggregate.usage.prompt_tokens,
            completion_tokens: aggregate.usage.completion_tokens,
            total_tokens: aggregate.usage.total_tokens,
            chunks,
        })
    }
}
