//! Error types for loading and compiling IR modules

use thiserror::Error;

/// Error raised while loading IR text
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {message}")]
pub struct ParseError {
    /// 1-based source line
    pub line: usize,
    /// What went wrong
    pub message: String,
}

impl ParseError {
    pub(crate) fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

/// Error raised while generating or invoking native code
#[derive(Debug, Error)]
pub enum CompileError {
    /// Target ISA or codegen flags could not be set up
    #[error("target setup failed: {0}")]
    Isa(String),
    /// Cranelift module error (declaration, definition, finalization)
    #[error("codegen failed: {0}")]
    Module(#[from] cranelift_module::ModuleError),
    /// A callee is neither defined in the module nor registered as a host symbol
    #[error("unresolved symbol `{0}`")]
    UnresolvedSymbol(String),
    /// A call passes the wrong number of arguments
    #[error("`{callee}` expects {expected} arguments, call site in `{caller}` passes {found}")]
    ArityMismatch {
        /// Calling function
        caller: String,
        /// Called function
        callee: String,
        /// Declared parameter count
        expected: usize,
        /// Arguments at the call site
        found: usize,
    },
    /// No compiled function with that name
    #[error("no compiled function named `{0}`")]
    UnknownEntry(String),
    /// Entry point invoked with the wrong number of arguments
    #[error("entry point `{name}` takes {expected} arguments, got {found}")]
    BadInvocation {
        /// Entry point name
        name: String,
        /// Declared parameter count
        expected: usize,
        /// Arguments supplied
        found: usize,
    },
    /// Entry points with this many parameters cannot be invoked from the host
    #[error("cannot invoke a function with {0} parameters from the host")]
    UnsupportedArity(usize),
}
