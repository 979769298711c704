//! Buffer geometry shared by every benchmark variant.
//!
//! Variants are only comparable if they copy the same spans out of the same
//! source shape, so the sizes and offsets live here once instead of being
//! repeated per benchmark.
//!
//! # Copy placement
//! A [`CopyPlan`] is an ordered list of [`CopySpan`]s. Span `i` reads
//! `len` bytes at `src_offset` in the source and lands in the output buffer
//! at the running sum of the lengths of spans `0..i`, so the output regions
//! are contiguous and disjoint. For [`CopyPlan::STANDARD`] that is offsets
//! 0, 401 and 1202 with a 1503 byte footprint.
//!
//! The copies normally run in that same order. A plan may carry a separate
//! copy order (a permutation of span indices) without moving any output
//! region: [`CopyPlan::WITH_TRAILER`] writes its trailer at offset 1503
//! before the third copy fills 1202..1503.

use std::fmt;

/// Bytes in one source buffer.
pub const SOURCE_LEN: usize = 17234;

/// Marker value written to every source byte.
pub const SOURCE_FILL: u8 = 0xA6;

/// Bytes in the stack-resident output buffer.
pub const OUTPUT_LEN: usize = 3 * 1024;

/// Assumed cache line size.
pub const CACHE_LINE: usize = 64;

/// Base page size.
pub const PAGE_SIZE: usize = 4 * 1024;

/// Large page size (one last-level page table spans this much).
pub const LARGE_PAGE: usize = 2 * 1024 * 1024;

/// Huge page size (one page directory entry spans this much).
pub const HUGE_PAGE: usize = 1024 * 1024 * 1024;

/// One mebibyte.
pub const MIB: usize = 1024 * 1024;

/// Replica count used by the flush-based variants.
pub const DEFAULT_REPLICAS: usize = 1000;

/// Flush buffers are this many times larger than the assumed cache.
pub const FLUSH_MULTIPLIER: usize = 4;

/// Output buffer used by the measured copies.
pub type OutputBuffer = [u8; OUTPUT_LEN];

/// One fixed-offset copy out of the source buffer.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CopySpan {
    /// Offset of the first byte read from the source.
    pub src_offset: usize,
    /// Number of bytes copied.
    pub len: usize,
}

impl CopySpan {
    /// Creates a span.
    pub const fn new(src_offset: usize, len: usize) -> Self {
        Self { src_offset, len }
    }

    /// One past the last source byte read, or `None` on overflow.
    #[inline]
    pub const fn src_end(&self) -> Option<usize> {
        self.src_offset.checked_add(self.len)
    }
}

/// A span paired with its destination offset in the output buffer.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Placement {
    pub span: CopySpan,
    pub dst_offset: usize,
}

/// Ordered set of copies performed per measured iteration.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CopyPlan {
    spans: &'static [CopySpan],
    order: Option<&'static [usize]>,
}

const STANDARD_SPANS: [CopySpan; 3] = [
    CopySpan::new(102, 401),
    CopySpan::new(6402, 801),
    CopySpan::new(16586, 301),
];

const SINGLE_SPANS: [CopySpan; 1] = [CopySpan::new(102, 401)];

const TRAILER_SPANS: [CopySpan; 4] = [
    CopySpan::new(102, 401),
    CopySpan::new(6402, 801),
    CopySpan::new(16586, 301),
    CopySpan::new(12308, 501),
];

const TRAILER_ORDER: [usize; 4] = [0, 1, 3, 2];

impl CopyPlan {
    /// Three copies, 1503 bytes total.
    pub const STANDARD: CopyPlan = CopyPlan {
        spans: &STANDARD_SPANS,
        order: None,
    };

    /// A single 401 byte copy.
    pub const SINGLE: CopyPlan = CopyPlan {
        spans: &SINGLE_SPANS,
        order: None,
    };

    /// The standard copies plus a fourth 501 byte copy at 1503, 2004 bytes
    /// total. The trailer is copied before the third standard span.
    pub const WITH_TRAILER: CopyPlan = CopyPlan {
        spans: &TRAILER_SPANS,
        order: Some(&TRAILER_ORDER),
    };

    /// Builds a plan from caller-provided spans, copied in output order.
    pub const fn from_spans(spans: &'static [CopySpan]) -> Self {
        Self { spans, order: None }
    }

    /// Copies the spans in `order` (indices into the spans) instead of output
    /// order. [`validate`](Self::validate) checks it is a permutation.
    pub const fn with_copy_order(mut self, order: &'static [usize]) -> Self {
        self.order = Some(order);
        self
    }

    /// Spans in output order.
    #[inline]
    pub fn spans(&self) -> &'static [CopySpan] {
        self.spans
    }

    /// Number of copies per iteration.
    #[inline]
    pub fn len(&self) -> usize {
        self.spans.len()
    }

    /// True if the plan copies nothing.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Total bytes written to the output buffer per iteration.
    pub fn footprint(&self) -> usize {
        self.spans.iter().map(|s| s.len).sum()
    }

    /// Spans with their destination offsets (running sum of prior lengths).
    pub fn placements(&self) -> impl Iterator<Item = Placement> + '_ {
        self.spans.iter().scan(0usize, |dst, span| {
            let placement = Placement {
                span: *span,
                dst_offset: *dst,
            };
            *dst += span.len;
            Some(placement)
        })
    }

    /// Placements in the order the copies run.
    #[inline]
    pub fn copy_sequence(&self) -> impl Iterator<Item = Placement> + '_ {
        (0..self.spans.len()).map(move |step| {
            let index = match self.order {
                Some(order) => order[step],
                None => step,
            };
            self.placement(index)
        })
    }

    /// Span `index` with its destination offset.
    ///
    /// # Panics
    /// Panics if `index >= len()`.
    #[inline]
    pub fn placement(&self, index: usize) -> Placement {
        Placement {
            span: self.spans[index],
            dst_offset: self.spans[..index].iter().map(|s| s.len).sum(),
        }
    }

    /// Checks that every span reads inside `source_len` bytes and that the
    /// combined footprint fits in `output_len` bytes.
    pub fn validate(&self, source_len: usize, output_len: usize) -> Result<(), PlanError> {
        if self.spans.is_empty() {
            return Err(PlanError::Empty);
        }
        for (index, span) in self.spans.iter().enumerate() {
            if span.len == 0 {
                return Err(PlanError::EmptySpan { index });
            }
            match span.src_end() {
                Some(end) if end <= source_len => {}
                _ => {
                    return Err(PlanError::SourceOverrun {
                        index,
                        src_offset: span.src_offset,
                        len: span.len,
                        source_len,
                    })
                }
            }
        }
        if let Some(order) = self.order {
            let mut seen = vec![false; self.spans.len()];
            let permutation = order.len() == seen.len()
                && order
                    .iter()
                    .all(|&i| i < seen.len() && !std::mem::replace(&mut seen[i], true));
            if !permutation {
                return Err(PlanError::BadCopyOrder {
                    spans: self.spans.len(),
                });
            }
        }
        let footprint = self.footprint();
        if footprint > output_len {
            return Err(PlanError::OutputOverflow {
                footprint,
                output_len,
            });
        }
        Ok(())
    }
}

/// Errors from validating a [`CopyPlan`] against buffer sizes.
#[derive(Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum PlanError {
    /// The plan contains no spans.
    Empty,
    /// A span copies zero bytes.
    EmptySpan { index: usize },
    /// A span reads past the end of the source buffer.
    SourceOverrun {
        index: usize,
        src_offset: usize,
        len: usize,
        source_len: usize,
    },
    /// The spans together do not fit in the output buffer.
    OutputOverflow { footprint: usize, output_len: usize },
    /// The copy order is not a permutation of the span indices.
    BadCopyOrder { spans: usize },
}

impl fmt::Display for PlanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "copy plan has no spans"),
            Self::BadCopyOrder { spans } => {
                write!(f, "copy order is not a permutation of {spans} spans")
            }
            Self::EmptySpan { index } => write!(f, "copy span {index} has zero length"),
            Self::SourceOverrun {
                index,
                src_offset,
                len,
                source_len,
            } => write!(
                f,
                "copy span {index} reads {len} bytes at {src_offset}, past source length {source_len}"
            ),
            Self::OutputOverflow {
                footprint,
                output_len,
            } => write!(
                f,
                "copy footprint {footprint} exceeds output buffer of {output_len} bytes"
            ),
        }
    }
}

impl std::error::Error for PlanError {}
