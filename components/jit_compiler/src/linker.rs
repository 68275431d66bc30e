//! Native link-time inliner
//!
//! Runs before code generation and replaces call instructions with a copy of
//! the callee's body. Two size limits apply, depending on the call kind:
//! - plain calls are inlined only for callees of at most
//!   [`CALL_INLINE_THRESHOLD`] instructions
//! - inline candidates are inlined for callees of at most
//!   [`INLINE_THRESHOLD`] instructions
//!
//! A growth budget stops inlining into a caller once it has grown past 150%
//! of its original size and past 200 instructions. Self-recursive calls are
//! never inlined. Spliced bodies are not rescanned.

use crate::ir::{CallKind, IRFunction, IRInstruction, IRModule, IROpcode, LabelId, Operand, Reg};
use tracing::{debug, trace};

/// Largest callee a plain call is inlined for (in IR instructions)
pub const CALL_INLINE_THRESHOLD: usize = 50;

/// Largest callee an inline candidate is inlined for (in IR instructions)
pub const INLINE_THRESHOLD: usize = 200;

/// Configuration for the native inliner
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Size limit for plain calls
    pub call_inline_threshold: usize,
    /// Size limit for inline candidates
    pub inline_threshold: usize,
    /// Caller may grow to this percentage of its original size
    pub max_growth_percent: usize,
    /// Growth budget only applies once the caller exceeds this size
    pub growth_floor: usize,
    /// Disable to link without inlining anything
    pub enabled: bool,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            call_inline_threshold: CALL_INLINE_THRESHOLD,
            inline_threshold: INLINE_THRESHOLD,
            max_growth_percent: 150,
            growth_floor: 200,
            enabled: true,
        }
    }
}

/// Statistics about a link pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkStats {
    /// Call sites replaced by the callee body
    pub inlined: usize,
    /// Inlined sites that were inline candidates
    pub inlined_candidates: usize,
    /// Declined because the callee exceeds the size limit for its call kind
    pub declined_size: usize,
    /// Declined because the caller exhausted its growth budget
    pub declined_budget: usize,
    /// Declined because the call is self-recursive
    pub declined_recursive: usize,
    /// Declined because argument count and parameter count differ
    pub declined_arity: usize,
    /// Calls to functions outside the module
    pub external: usize,
}

/// Budget tracker for one caller
#[derive(Debug, Clone)]
struct GrowthBudget {
    original_size: usize,
    max_growth_percent: usize,
    growth_floor: usize,
}

impl GrowthBudget {
    fn exhausted(&self, current_size: usize) -> bool {
        current_size * 100 > self.original_size * self.max_growth_percent
            && current_size > self.growth_floor
    }
}

/// Native inliner, run once per module before code generation
#[derive(Debug, Default)]
pub struct Linker {
    config: LinkConfig,
}

impl Linker {
    /// Create a linker with default limits
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with custom configuration
    pub fn with_config(config: LinkConfig) -> Self {
        Self { config }
    }

    /// Get configuration
    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// Inline eligible call sites in every function of the module
    pub fn link(&self, module: &mut IRModule) -> LinkStats {
        let mut stats = LinkStats::default();
        if !self.config.enabled {
            return stats;
        }

        // Callee bodies are always taken from the module as loaded.
        let originals: Vec<IRFunction> = module.functions().to_vec();

        for caller in module.functions_mut() {
            self.link_function(caller, &originals, &mut stats);
        }

        debug!(
            module = %module.name,
            inlined = stats.inlined,
            declined_size = stats.declined_size,
            declined_budget = stats.declined_budget,
            "link complete"
        );
        stats
    }

    fn link_function(&self, caller: &mut IRFunction, originals: &[IRFunction], stats: &mut LinkStats) {
        let budget = GrowthBudget {
            original_size: caller.instruction_count(),
            max_growth_percent: self.config.max_growth_percent,
            growth_floor: self.config.growth_floor,
        };
        let mut splices = 0usize;
        let mut i = 0;

        while i < caller.instructions.len() {
            let (kind, callee_name, dst, args) = match &caller.instructions[i].opcode {
                IROpcode::Call { kind, callee, dst, args } => (*kind, callee.clone(), *dst, args.clone()),
                _ => {
                    i += 1;
                    continue;
                }
            };

            let Some(callee) = originals.iter().find(|f| f.name == callee_name) else {
                stats.external += 1;
                i += 1;
                continue;
            };

            if callee.name == caller.name {
                stats.declined_recursive += 1;
                i += 1;
                continue;
            }

            let limit = match kind {
                CallKind::Call => self.config.call_inline_threshold,
                CallKind::Inline => self.config.inline_threshold,
            };
            if callee.instruction_count() > limit {
                trace!(caller = %caller.name, callee = %callee.name, size = callee.instruction_count(), limit, "callee too large");
                stats.declined_size += 1;
                i += 1;
                continue;
            }

            if budget.exhausted(caller.instruction_count()) {
                trace!(caller = %caller.name, callee = %callee.name, size = caller.instruction_count(), "growth budget exhausted");
                stats.declined_budget += 1;
                i += 1;
                continue;
            }

            if args.len() != callee.param_count {
                stats.declined_arity += 1;
                i += 1;
                continue;
            }

            let body = splice_body(caller, callee, dst, &args, splices);
            splices += 1;
            let len = body.len();
            caller.instructions.splice(i..=i, body);
            i += len;

            stats.inlined += 1;
            if kind == CallKind::Inline {
                stats.inlined_candidates += 1;
            }
        }
    }
}

/// Build the instruction sequence replacing one call
///
/// Callee registers and labels are renamed into fresh caller registers and
/// labels. Parameters receive the arguments, locals start at zero, and every
/// return becomes a move into the call's destination plus a jump to the exit.
fn splice_body(
    caller: &mut IRFunction,
    callee: &IRFunction,
    dst: Option<Reg>,
    args: &[Operand],
    splice_id: usize,
) -> Vec<IRInstruction> {
    let prefix = format!("{}.{}", callee.name, splice_id);

    let reg_map: Vec<Reg> = callee
        .registers
        .iter()
        .map(|r| caller.add_local(&format!("{}.{}", prefix, r)))
        .collect();
    let label_map: Vec<LabelId> = callee
        .labels
        .iter()
        .map(|l| caller.label(&format!("{}.{}", prefix, l)))
        .collect();
    let exit = caller.label(&format!("{}.exit", prefix));

    let map_reg = |r: Reg| reg_map[r.0 as usize];
    let map_op = |op: Operand| match op {
        Operand::Reg(r) => Operand::Reg(map_reg(r)),
        imm => imm,
    };
    let map_label = |l: LabelId| label_map[l.0 as usize];

    let mut out = Vec::with_capacity(callee.instruction_count() + callee.registers.len() + 1);

    for (i, reg) in reg_map.iter().enumerate() {
        let src = if i < callee.param_count { args[i] } else { Operand::Imm(0) };
        out.push(IRInstruction::new(IROpcode::Mov { dst: *reg, src }, 0));
    }

    for inst in &callee.instructions {
        let opcode = match &inst.opcode {
            IROpcode::Mov { dst, src } => IROpcode::Mov {
                dst: map_reg(*dst),
                src: map_op(*src),
            },
            IROpcode::Binary { op, dst, lhs, rhs } => IROpcode::Binary {
                op: *op,
                dst: map_reg(*dst),
                lhs: map_op(*lhs),
                rhs: map_op(*rhs),
            },
            IROpcode::Branch { cond, target, lhs, rhs } => IROpcode::Branch {
                cond: *cond,
                target: map_label(*target),
                lhs: map_op(*lhs),
                rhs: map_op(*rhs),
            },
            IROpcode::Jump(target) => IROpcode::Jump(map_label(*target)),
            IROpcode::Label(label) => IROpcode::Label(map_label(*label)),
            IROpcode::Call { kind, callee, dst, args } => IROpcode::Call {
                kind: *kind,
                callee: callee.clone(),
                dst: dst.map(map_reg),
                args: args.iter().map(|a| map_op(*a)).collect(),
            },
            IROpcode::Ret(value) => {
                if let Some(d) = dst {
                    let src = value.map(map_op).unwrap_or(Operand::Imm(0));
                    out.push(IRInstruction::new(IROpcode::Mov { dst: d, src }, inst.line));
                }
                IROpcode::Jump(exit)
            }
        };
        out.push(IRInstruction::new(opcode, inst.line));
    }

    // A body that falls off its end returns zero.
    if let Some(d) = dst {
        if !matches!(callee.instructions.last().map(|i| &i.opcode), Some(IROpcode::Ret(_))) {
            out.push(IRInstruction::new(IROpcode::Mov { dst: d, src: Operand::Imm(0) }, 0));
        }
    }
    out.push(IRInstruction::new(IROpcode::Label(exit), 0));
    out
}
