//! `memcpy_baseline_inline`: the warm-cache reference point.
//!
//! The same three copies every other variant performs, from a single source
//! buffer that stays in L1, with lengths the compiler can see. Nothing is
//! evicted.

use std::hint::black_box;

use crate::arena::ByteArena;
use crate::copy::copy_inline;
use crate::counters::Footprint;
use crate::error::SetupError;
use crate::evict::EvictError;
use crate::geometry::{CopyPlan, OutputBuffer, OUTPUT_LEN, SOURCE_LEN};
use crate::timing::{IterClock, Timing};

use super::{output_matches, source_buffer, Experiment};

pub struct InlineBaseline {
    source: ByteArena,
    out: OutputBuffer,
}

impl InlineBaseline {
    pub fn new() -> Result<Self, SetupError> {
        CopyPlan::STANDARD.validate(SOURCE_LEN, OUTPUT_LEN)?;
        Ok(Self {
            source: source_buffer()?,
            out: [0; OUTPUT_LEN],
        })
    }
}

impl Experiment for InlineBaseline {
    fn name(&self) -> &'static str {
        "memcpy_baseline_inline"
    }

    fn timing(&self) -> Timing {
        Timing::Harness
    }

    fn footprint(&self) -> Footprint {
        Footprint {
            bytes_per_iteration: CopyPlan::STANDARD.footprint(),
            num_copies: 1,
            allocated: SOURCE_LEN,
        }
    }

    #[inline]
    fn iterate(&mut self, clock: &mut IterClock) -> Result<(), EvictError> {
        let src = self.source.as_slice();
        let out = &mut self.out;
        clock.measure(|| copy_inline(src, out));
        black_box(&mut self.out);
        Ok(())
    }

    fn verify(&self) -> bool {
        output_matches(&CopyPlan::STANDARD, self.source.as_slice(), &self.out)
    }
}
