//! Small JIT compiler for a register-based integer IR
//!
//! This crate provides:
//! - IR: modules of functions over 64-bit integer registers
//! - Parser: a line-oriented text format for IR modules
//! - Linker: a size-limited inliner run before code generation
//! - Cranelift backend: native code generation and invocation
//!
//! Calls come in two kinds. A plain [`CallKind::Call`] is inlined by the
//! linker only for very small callees; a [`CallKind::Inline`] call is an
//! inline candidate and is inlined for callees up to
//! [`linker::INLINE_THRESHOLD`] instructions. Rewriting call kinds between
//! loading and linking is how callers steer inlining.
//!
//! # Example
//!
//! ```
//! use jit_compiler::CompilationContext;
//!
//! let src = "\
//! func double(x)
//!   add x, x, x
//!   ret x
//! endfunc
//! func main(n) export
//!   local r
//!   inline r, double, n
//!   ret r
//! endfunc
//! ";
//!
//! let mut ctx = CompilationContext::from_source(src).unwrap();
//! let stats = ctx.link();
//! assert_eq!(stats.inlined, 1);
//!
//! let compiled = ctx.compile().unwrap();
//! assert_eq!(compiled.entry("main").unwrap().invoke(&[21]).unwrap(), 42);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod context;
pub mod cranelift_backend;
pub mod error;
pub mod ir;
pub mod linker;
pub mod parser;

// Re-export main types at crate root
pub use context::CompilationContext;
pub use cranelift_backend::{CompiledModule, CraneliftBackend, EntryPoint, HostSymbol, OptLevel};
pub use error::{CompileError, ParseError};
pub use ir::{CallKind, IRFunction, IRInstruction, IRModule, IROpcode};
pub use linker::{LinkConfig, LinkStats, Linker};
pub use parser::parse_module;
