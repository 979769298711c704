//! Every benchmark variant with its argument sweep and run settings.
//!
//! The same table drives `cargo bench` and the `vmemprof` runner, so the
//! two cannot disagree about what a variant is or how it is swept.

use crate::error::SetupError;
use crate::evict::Capabilities;
use crate::experiments::{
    CapacityRotation, CpuFlush, CpuFlushConfig, Experiment, InlineBaseline, LineFlushConfig,
    LineFlushCopy,
};
use crate::timing::Timing;

/// Arguments of one sweep point.
pub type Args = &'static [u64];

/// Which bench target a variant belongs to.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Group {
    /// Stand-alone copy benchmarks.
    Memcpy,
    /// Copies under the eviction strategies studied for decompression.
    DecompSim,
    /// Single-copy flush cost comparisons.
    CacheFlushing,
}

/// Host capability a variant needs.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Requirement {
    None,
    LineFlush,
    Translation,
}

impl Requirement {
    /// True if `caps` provides this requirement.
    pub fn satisfied_by(self, caps: Capabilities) -> bool {
        match self {
            Self::None => true,
            Self::LineFlush => caps.line_flush,
            Self::Translation => caps.translation,
        }
    }
}

type Build = fn(&[u64]) -> Result<Box<dyn Experiment>, SetupError>;

/// One registered variant.
#[derive(Clone, Copy)]
pub struct BenchSpec {
    pub name: &'static str,
    pub group: Group,
    /// Argument names, one per position in each sweep entry.
    pub params: &'static [&'static str],
    pub sweep: &'static [Args],
    pub repetitions: u32,
    /// Fixed iteration count, or `None` to let the runner calibrate.
    pub iterations: Option<u64>,
    pub timing: Timing,
    pub requires: Requirement,
    build: Build,
}

impl BenchSpec {
    /// Builds an instance for `args`.
    pub fn build(&self, args: &[u64]) -> Result<Box<dyn Experiment>, SetupError> {
        if args.len() != self.params.len() {
            return Err(SetupError::BadArguments {
                name: self.name,
                expected: self.params.len(),
                got: args.len(),
            });
        }
        (self.build)(args)
    }

    /// `name/arg0/arg1...`
    pub fn label(&self, args: &[u64]) -> String {
        let mut label = self.name.to_string();
        for arg in args {
            label.push('/');
            label.push_str(&arg.to_string());
        }
        label
    }
}

impl std::fmt::Debug for BenchSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BenchSpec")
            .field("name", &self.name)
            .field("group", &self.group)
            .field("sweep", &self.sweep)
            .field("repetitions", &self.repetitions)
            .field("iterations", &self.iterations)
            .field("timing", &self.timing)
            .field("requires", &self.requires)
            .finish()
    }
}

fn arg(args: &[u64], name: &'static str, param: &'static str, idx: usize) -> Result<usize, SetupError> {
    let value = args[idx];
    usize::try_from(value).map_err(|_| SetupError::ArgumentOutOfRange {
        name,
        arg: param,
        value,
    })
}

fn boxed<E: Experiment + 'static>(exp: E) -> Box<dyn Experiment> {
    Box::new(exp)
}

const NO_ARGS: &[Args] = &[&[]];
const CACHE_MIB: &[Args] = &[&[8], &[16], &[32]];

static SPECS: &[BenchSpec] = &[
    BenchSpec {
        name: "memcpy_baseline_inline",
        group: Group::Memcpy,
        params: &[],
        sweep: NO_ARGS,
        repetitions: 4,
        iterations: None,
        timing: Timing::Harness,
        requires: Requirement::None,
        build: |_| Ok(boxed(InlineBaseline::new()?)),
    },
    BenchSpec {
        name: "memcpy_32mb_l3",
        group: Group::Memcpy,
        params: &["cache_mib"],
        sweep: &[&[33], &[43], &[53]],
        repetitions: 4,
        iterations: None,
        timing: Timing::Harness,
        requires: Requirement::None,
        build: |args| {
            let cache = arg(args, "memcpy_32mb_l3", "cache_mib", 0)?;
            Ok(boxed(CapacityRotation::l3(cache)?))
        },
    },
    #[cfg(all(unix, feature = "vmem"))]
    BenchSpec {
        name: "memcpy_wip_flush",
        group: Group::Memcpy,
        params: &["cache_mib", "guard_mib"],
        sweep: &[
            &[8, 0],
            &[8, 2],
            &[8, 8],
            &[8, 32],
            &[8, 64],
            &[8, 96],
            &[32, 0],
            &[32, 2],
            &[32, 8],
            &[32, 32],
            &[32, 64],
            &[32, 96],
        ],
        repetitions: 4,
        iterations: Some(3_000_000),
        timing: Timing::Manual,
        requires: Requirement::Translation,
        build: |args| {
            let cache = arg(args, "memcpy_wip_flush", "cache_mib", 0)?;
            let guard = arg(args, "memcpy_wip_flush", "guard_mib", 1)?;
            let config = crate::experiments::WipFlushConfig::new(cache, guard)?;
            Ok(boxed(crate::experiments::WipFlush::new(config)?))
        },
    },
    BenchSpec {
        name: "memcpy_clflush",
        group: Group::DecompSim,
        params: &[],
        sweep: NO_ARGS,
        repetitions: 1,
        iterations: Some(100_000),
        timing: Timing::Manual,
        requires: Requirement::LineFlush,
        build: |_| Ok(boxed(LineFlushCopy::new(LineFlushConfig::MEMCPY)?)),
    },
    BenchSpec {
        name: "memcpy_cpu_flush",
        group: Group::DecompSim,
        params: &["cache_mib"],
        sweep: CACHE_MIB,
        repetitions: 4,
        iterations: None,
        timing: Timing::Manual,
        requires: Requirement::None,
        build: |args| {
            let cache = arg(args, "memcpy_cpu_flush", "cache_mib", 0)?;
            Ok(boxed(CpuFlush::new(CpuFlushConfig::byte_loop(cache)?)?))
        },
    },
    BenchSpec {
        name: "memcpy_cpu_flush_memset",
        group: Group::DecompSim,
        params: &["cache_mib"],
        sweep: CACHE_MIB,
        repetitions: 4,
        iterations: None,
        timing: Timing::Manual,
        requires: Requirement::None,
        build: |args| {
            let cache = arg(args, "memcpy_cpu_flush_memset", "cache_mib", 0)?;
            Ok(boxed(CpuFlush::new(CpuFlushConfig::memset(cache)?)?))
        },
    },
    BenchSpec {
        name: "memcpy_cpu_flush_padded",
        group: Group::DecompSim,
        params: &["guard_mib"],
        sweep: &[&[0], &[4], &[16], &[32], &[64], &[96]],
        repetitions: 20,
        iterations: None,
        timing: Timing::Manual,
        requires: Requirement::None,
        build: |args| {
            let guard = arg(args, "memcpy_cpu_flush_padded", "guard_mib", 0)?;
            Ok(boxed(CpuFlush::new(CpuFlushConfig::padded(guard)?)?))
        },
    },
    #[cfg(all(unix, feature = "vmem"))]
    BenchSpec {
        name: "memcpy_vmem_tlb_flush",
        group: Group::DecompSim,
        params: &["padding_kib"],
        sweep: &[&[40], &[68]],
        repetitions: 4,
        iterations: None,
        timing: Timing::Manual,
        requires: Requirement::Translation,
        build: |args| {
            let padding = arg(args, "memcpy_vmem_tlb_flush", "padding_kib", 0)?;
            Ok(boxed(crate::experiments::VmemTlbFlush::new(padding)?))
        },
    },
    BenchSpec {
        name: "memcpy_tlb",
        group: Group::DecompSim,
        params: &["replicas"],
        sweep: &[&[850], &[1500], &[2500], &[3500]],
        repetitions: 4,
        iterations: None,
        timing: Timing::Harness,
        requires: Requirement::None,
        build: |args| {
            let count = arg(args, "memcpy_tlb", "replicas", 0)?;
            Ok(boxed(CapacityRotation::tlb(count)?))
        },
    },
    BenchSpec {
        name: "memcpy_copies_padded",
        group: Group::DecompSim,
        params: &["padding"],
        sweep: &[&[0], &[4 * 1024], &[16 * 1024 * 1024]],
        repetitions: 4,
        iterations: None,
        timing: Timing::Manual,
        requires: Requirement::None,
        build: |args| {
            let padding = arg(args, "memcpy_copies_padded", "padding", 0)?;
            Ok(boxed(CpuFlush::new(CpuFlushConfig::copies_padded(padding))?))
        },
    },
    BenchSpec {
        name: "cache_flushing_clflush",
        group: Group::CacheFlushing,
        params: &[],
        sweep: NO_ARGS,
        repetitions: 4,
        iterations: Some(100_000),
        timing: Timing::Manual,
        requires: Requirement::LineFlush,
        build: |_| Ok(boxed(LineFlushCopy::new(LineFlushConfig::SINGLE)?)),
    },
    BenchSpec {
        name: "cache_flushing_flush_std_memset",
        group: Group::CacheFlushing,
        params: &["cache_mib"],
        sweep: CACHE_MIB,
        repetitions: 4,
        iterations: Some(100_000),
        timing: Timing::Manual,
        requires: Requirement::None,
        build: |args| {
            let cache = arg(args, "cache_flushing_flush_std_memset", "cache_mib", 0)?;
            Ok(boxed(CpuFlush::new(CpuFlushConfig::single_memset(cache)?)?))
        },
    },
];

/// Every variant compiled into this build.
pub fn all() -> &'static [BenchSpec] {
    SPECS
}

/// Variants the host can run.
pub fn available() -> impl Iterator<Item = &'static BenchSpec> {
    let caps = Capabilities::HOST;
    SPECS.iter().filter(move |s| s.requires.satisfied_by(caps))
}

/// Variants of one bench group the host can run.
pub fn group(group: Group) -> impl Iterator<Item = &'static BenchSpec> {
    available().filter(move |s| s.group == group)
}

/// Looks a variant up by name.
pub fn find(name: &str) -> Option<&'static BenchSpec> {
    SPECS.iter().find(|s| s.name == name)
}

/// Builds variant `name` with `args`.
pub fn instantiate(name: &str, args: &[u64]) -> Result<Box<dyn Experiment>, SetupError> {
    let spec = find(name).ok_or_else(|| SetupError::UnknownExperiment {
        name: name.to_string(),
    })?;
    spec.build(args)
}
