// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Bit layout checks shared by bit-set types, bit-field types and
//! inline field `bit_groups`.

use std::fmt;

/// Number of overlapping bit positions spelled out in a report.
const MAX_LISTED_BITS: usize = 64;

/// Bit range as written in a document. Values are not yet checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitRange {
    pub name: String,
    pub start_bit: i64,
    pub width: i64,
}

impl BitRange {
    pub fn new(name: &str, start_bit: i64, width: i64) -> Self {
        BitRange { name: name.to_owned(), start_bit, width }
    }
}

/// Sorted bit positions, truncated for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitList {
    pub bits: Vec<u64>,
    /// Total number of positions, listed or not.
    pub total: u64,
}

impl fmt::Display for BitList {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self.bits)?;
        let hidden = self.total - self.bits.len() as u64;
        if hidden > 0 {
            write!(f, " and {} more", hidden)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BitLayoutError {
    #[error("bit range '{name}' has negative start_bit {start_bit}")]
    NegativeStart { index: usize, name: String, start_bit: i64 },
    #[error("bit range '{name}' has width {width}, expected a positive width")]
    NonPositiveWidth { index: usize, name: String, width: i64 },
    #[error(
        "bit range '{name}' covers bits {first} to {last}, \
         beyond the {total_bits} bits of its container"
    )]
    OutOfRange { index: usize, name: String, first: u64, last: u64, total_bits: u64 },
    #[error("bit range '{name}' overlaps '{}' on bits {bits}", .previous.join("', '"))]
    Overlap { index: usize, name: String, previous: Vec<String>, bits: BitList },
}

impl BitLayoutError {
    /// Position of the offending descriptor in the layout.
    pub fn index(&self) -> usize {
        match self {
            BitLayoutError::NegativeStart { index, .. }
            | BitLayoutError::NonPositiveWidth { index, .. }
            | BitLayoutError::OutOfRange { index, .. }
            | BitLayoutError::Overlap { index, .. } => *index,
        }
    }
}

/// Check a bit layout in declaration order.
///
/// Each descriptor must have a non-negative start and a positive width,
/// and fit in `total_bits` when the container width is known. A
/// descriptor overlapping bits claimed by earlier descriptors is
/// reported, naming the earlier owners, and does not claim any bit
/// itself.
pub fn check(ranges: &[BitRange], total_bits: Option<u64>) -> Vec<BitLayoutError> {
    let mut errors = vec![];
    // Claimed intervals [start, end), pairwise disjoint.
    let mut claimed: Vec<(u64, u64, &str)> = vec![];

    for (index, range) in ranges.iter().enumerate() {
        let name = range.name.clone();
        if range.start_bit < 0 {
            errors.push(BitLayoutError::NegativeStart { index, name, start_bit: range.start_bit });
            continue;
        }
        if range.width <= 0 {
            errors.push(BitLayoutError::NonPositiveWidth { index, name, width: range.width });
            continue;
        }

        let start = range.start_bit as u64;
        let end = start + range.width as u64;
        if let Some(total_bits) = total_bits {
            if end > total_bits {
                errors.push(BitLayoutError::OutOfRange {
                    index,
                    name,
                    first: start,
                    last: end - 1,
                    total_bits,
                });
                continue;
            }
        }

        let mut overlaps: Vec<(u64, u64, &str)> = claimed
            .iter()
            .filter_map(|&(claim_start, claim_end, owner)| {
                let low = claim_start.max(start);
                let high = claim_end.min(end);
                (low < high).then_some((low, high, owner))
            })
            .collect();

        if overlaps.is_empty() {
            claimed.push((start, end, &range.name));
            continue;
        }

        overlaps.sort_unstable();
        let total = overlaps.iter().map(|(low, high, _)| high - low).sum();
        let bits = overlaps
            .iter()
            .flat_map(|&(low, high, _)| low..high)
            .take(MAX_LISTED_BITS)
            .collect();
        let mut previous = vec![];
        for (_, _, owner) in overlaps {
            if !previous.iter().any(|name| name == owner) {
                previous.push(owner.to_owned());
            }
        }
        errors.push(BitLayoutError::Overlap {
            index,
            name,
            previous,
            bits: BitList { bits, total },
        });
    }

    errors
}
