//! Intermediate representation for JIT compilation
//!
//! A register-based IR where every value is a 64-bit integer. A module is a
//! list of named functions; a function is a flat instruction list with
//! labels as branch targets. Calls name their callee, so a call can be
//! resolved against the module it lives in (or left unresolved when the
//! callee is an external symbol).

use std::collections::HashMap;
use std::fmt;

/// Register index within a function (parameters first, then locals)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Reg(pub u32);

/// Label index within a function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LabelId(pub u32);

/// Instruction operand
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    /// Read a register
    Reg(Reg),
    /// Immediate integer
    Imm(i64),
}

/// Two-operand arithmetic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// Wrapping addition
    Add,
    /// Wrapping subtraction
    Sub,
    /// Wrapping multiplication
    Mul,
    /// Signed division
    Div,
    /// Signed remainder
    Mod,
}

/// Comparison used by conditional branches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    /// Equal
    Eq,
    /// Not equal
    Ne,
    /// Signed less than
    Lt,
    /// Signed less than or equal
    Le,
    /// Signed greater than
    Gt,
    /// Signed greater than or equal
    Ge,
}

impl CmpOp {
    /// Evaluate the comparison on two integers
    pub fn holds(self, lhs: i64, rhs: i64) -> bool {
        match self {
            CmpOp::Eq => lhs == rhs,
            CmpOp::Ne => lhs != rhs,
            CmpOp::Lt => lhs < rhs,
            CmpOp::Le => lhs <= rhs,
            CmpOp::Gt => lhs > rhs,
            CmpOp::Ge => lhs >= rhs,
        }
    }
}

/// Kind of a call-family instruction
///
/// The native linker inlines plain calls only for very small callees and
/// inline candidates up to a larger size limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    /// Ordinary call
    Call,
    /// Call promoted to an inline candidate
    Inline,
}

/// IR operation types
#[derive(Debug, Clone, PartialEq)]
pub enum IROpcode {
    /// Copy a value into a register
    Mov {
        /// Destination register
        dst: Reg,
        /// Source value
        src: Operand,
    },
    /// Arithmetic on two operands
    Binary {
        /// Operation
        op: BinaryOp,
        /// Destination register
        dst: Reg,
        /// Left operand
        lhs: Operand,
        /// Right operand
        rhs: Operand,
    },
    /// Jump to `target` when the comparison holds, fall through otherwise
    Branch {
        /// Comparison
        cond: CmpOp,
        /// Branch target
        target: LabelId,
        /// Left operand
        lhs: Operand,
        /// Right operand
        rhs: Operand,
    },
    /// Unconditional jump
    Jump(LabelId),
    /// Branch target marker
    Label(LabelId),
    /// Call a function by name
    Call {
        /// Plain call or inline candidate
        kind: CallKind,
        /// Callee name
        callee: String,
        /// Register receiving the result, if any
        dst: Option<Reg>,
        /// Arguments
        args: Vec<Operand>,
    },
    /// Return from function
    Ret(Option<Operand>),
}

/// Single IR instruction
#[derive(Debug, Clone, PartialEq)]
pub struct IRInstruction {
    /// The operation to perform
    pub opcode: IROpcode,
    /// Source line (for diagnostics), 0 when synthesized
    pub line: usize,
}

impl IRInstruction {
    /// Create a new IR instruction
    pub fn new(opcode: IROpcode, line: usize) -> Self {
        Self { opcode, line }
    }

    /// Whether this is a call-family instruction (plain call or inline candidate)
    pub fn is_call(&self) -> bool {
        matches!(self.opcode, IROpcode::Call { .. })
    }

    /// Call kind, if this is a call-family instruction
    pub fn call_kind(&self) -> Option<CallKind> {
        match &self.opcode {
            IROpcode::Call { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Callee name, if this is a call-family instruction
    pub fn callee(&self) -> Option<&str> {
        match &self.opcode {
            IROpcode::Call { callee, .. } => Some(callee),
            _ => None,
        }
    }

    /// Change the kind of a call instruction in place
    ///
    /// Returns false (and changes nothing) for non-call instructions.
    pub fn set_call_kind(&mut self, new_kind: CallKind) -> bool {
        match &mut self.opcode {
            IROpcode::Call { kind, .. } => {
                *kind = new_kind;
                true
            }
            _ => false,
        }
    }
}

/// IR function representation
#[derive(Debug, Clone)]
pub struct IRFunction {
    /// Function name, unique within its module
    pub name: String,
    /// Register names; the first `param_count` are parameters
    pub registers: Vec<String>,
    /// Number of parameters
    pub param_count: usize,
    /// Label names
    pub labels: Vec<String>,
    /// List of IR instructions
    pub instructions: Vec<IRInstruction>,
    /// Whether the function is visible to the host
    pub exported: bool,
}

impl IRFunction {
    /// Create an empty function with the given parameters
    pub fn new(name: impl Into<String>, params: &[&str]) -> Self {
        Self {
            name: name.into(),
            registers: params.iter().map(|p| p.to_string()).collect(),
            param_count: params.len(),
            labels: Vec::new(),
            instructions: Vec::new(),
            exported: false,
        }
    }

    /// Mark the function as exported
    pub fn exported(mut self) -> Self {
        self.exported = true;
        self
    }

    /// Declare a local register, returning the existing one if already declared
    pub fn add_local(&mut self, name: &str) -> Reg {
        if let Some(reg) = self.reg(name) {
            return reg;
        }
        self.registers.push(name.to_string());
        Reg(self.registers.len() as u32 - 1)
    }

    /// Look up a register by name
    pub fn reg(&self, name: &str) -> Option<Reg> {
        self.registers
            .iter()
            .position(|r| r == name)
            .map(|i| Reg(i as u32))
    }

    /// Parameter registers, in order
    pub fn params(&self) -> impl Iterator<Item = Reg> {
        (0..self.param_count as u32).map(Reg)
    }

    /// Look up a label by name, creating it if unseen
    pub fn label(&mut self, name: &str) -> LabelId {
        if let Some(i) = self.labels.iter().position(|l| l == name) {
            return LabelId(i as u32);
        }
        self.labels.push(name.to_string());
        LabelId(self.labels.len() as u32 - 1)
    }

    /// Add an instruction to the IR
    pub fn emit(&mut self, opcode: IROpcode) {
        self.instructions.push(IRInstruction::new(opcode, 0));
    }

    /// Get number of instructions (labels included)
    pub fn instruction_count(&self) -> usize {
        self.instructions.len()
    }

    /// Register name for diagnostics
    pub fn reg_name(&self, reg: Reg) -> &str {
        self.registers
            .get(reg.0 as usize)
            .map(String::as_str)
            .unwrap_or("?")
    }
}

/// A compilation unit: a named collection of functions
#[derive(Debug, Clone, Default)]
pub struct IRModule {
    /// Module name
    pub name: String,
    functions: Vec<IRFunction>,
    index: HashMap<String, usize>,
}

impl IRModule {
    /// Create an empty module
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            functions: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Add a function; returns false if the name is already taken
    pub fn add_function(&mut self, function: IRFunction) -> bool {
        if self.index.contains_key(&function.name) {
            return false;
        }
        self.index
            .insert(function.name.clone(), self.functions.len());
        self.functions.push(function);
        true
    }

    /// Functions in definition order
    pub fn functions(&self) -> &[IRFunction] {
        &self.functions
    }

    /// Mutable access to function bodies
    ///
    /// Function names must not be changed through this slice.
    pub fn functions_mut(&mut self) -> &mut [IRFunction] {
        &mut self.functions
    }

    /// Resolve a callee name to a function body in this module
    pub fn function(&self, name: &str) -> Option<&IRFunction> {
        self.index.get(name).map(|&i| &self.functions[i])
    }

    /// Index of a function by name
    pub fn function_index(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Callee names referenced by calls but not defined in the module
    pub fn external_callees(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for func in &self.functions {
            for inst in &func.instructions {
                if let Some(callee) = inst.callee() {
                    if !self.index.contains_key(callee) && !names.iter().any(|n| n == callee) {
                        names.push(callee.to_string());
                    }
                }
            }
        }
        names
    }

    /// Total instruction count across all functions
    pub fn instruction_count(&self) -> usize {
        self.functions.iter().map(IRFunction::instruction_count).sum()
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Reg(r) => write!(f, "r{}", r.0),
            Operand::Imm(v) => write!(f, "{}", v),
        }
    }
}
