//! Compilation context: load, link, and generate code for one module
//!
//! The context owns the IR between loading and code generation. Callers may
//! inspect and rewrite the module (for example to promote calls to inline
//! calls) before [`CompilationContext::link`] and
//! [`CompilationContext::compile`].

use crate::cranelift_backend::{CompiledModule, CraneliftBackend, HostSymbol, OptLevel};
use crate::error::{CompileError, ParseError};
use crate::ir::IRModule;
use crate::linker::{LinkConfig, LinkStats, Linker};
use crate::parser::parse_module;
use tracing::debug;

/// Owns one IR module on its way to native code
pub struct CompilationContext {
    module: IRModule,
    host_symbols: Vec<HostSymbol>,
    opt_level: OptLevel,
    linker: Linker,
}

impl CompilationContext {
    /// Wrap an already-built module
    pub fn new(module: IRModule) -> Self {
        Self {
            module,
            host_symbols: Vec::new(),
            opt_level: OptLevel::default(),
            linker: Linker::new(),
        }
    }

    /// Load a module from IR text
    pub fn from_source(source: &str) -> Result<Self, ParseError> {
        let module = parse_module(source)?;
        debug!(
            module = %module.name,
            functions = module.functions().len(),
            instructions = module.instruction_count(),
            "module loaded"
        );
        Ok(Self::new(module))
    }

    /// Set the Cranelift optimization level
    pub fn with_opt_level(mut self, opt_level: OptLevel) -> Self {
        self.opt_level = opt_level;
        self
    }

    /// Replace the linker configuration
    pub fn with_link_config(mut self, config: LinkConfig) -> Self {
        self.linker = Linker::with_config(config);
        self
    }

    /// The loaded module
    pub fn module(&self) -> &IRModule {
        &self.module
    }

    /// Mutable access to the loaded module
    pub fn module_mut(&mut self) -> &mut IRModule {
        &mut self.module
    }

    /// Make a host function callable from generated code under `name`
    ///
    /// `address` must point to an `extern "C"` function taking `arity`
    /// `i64` arguments and returning `i64`.
    pub fn register_symbol(&mut self, name: impl Into<String>, address: *const u8, arity: usize) {
        self.host_symbols.push(HostSymbol {
            name: name.into(),
            address,
            arity,
        });
    }

    /// Run the native inliner over the module
    pub fn link(&mut self) -> LinkStats {
        self.linker.link(&mut self.module)
    }

    /// Generate native code for the module as it stands
    pub fn compile(&self) -> Result<CompiledModule, CompileError> {
        CraneliftBackend::new(self.opt_level, self.host_symbols.clone())?.compile_module(&self.module)
    }

    /// Consume the context, returning the module
    pub fn into_module(self) -> IRModule {
        self.module
    }
}
