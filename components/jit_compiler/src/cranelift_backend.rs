//! Cranelift-based JIT compiler backend
//!
//! Lowers an [`IRModule`] to native code. Every function has the signature
//! `(i64, ...) -> i64`. Registers become Cranelift variables, labels become
//! blocks, and calls to functions outside the module are bound to host
//! symbols registered up front.

use crate::error::CompileError;
use crate::ir::{BinaryOp, CmpOp, IRFunction, IRModule, IROpcode, Operand};
use cranelift_codegen::ir::condcodes::IntCC;
use cranelift_codegen::ir::{types, AbiParam, Block, InstBuilder, Signature, Value};
use cranelift_codegen::settings::{self, Configurable};
use cranelift_codegen::Context;
use cranelift_frontend::{FunctionBuilder, FunctionBuilderContext, Variable};
use cranelift_jit::{JITBuilder, JITModule};
use cranelift_module::{FuncId, Linkage, Module};
use std::collections::HashMap;
use tracing::debug;

/// Cranelift optimization level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OptLevel {
    /// No optimization
    None,
    /// Optimize for speed
    #[default]
    Speed,
    /// Optimize for speed and code size
    SpeedAndSize,
}

impl OptLevel {
    fn as_setting(self) -> &'static str {
        match self {
            OptLevel::None => "none",
            OptLevel::Speed => "speed",
            OptLevel::SpeedAndSize => "speed_and_size",
        }
    }
}

/// A host function the generated code may call
#[derive(Debug, Clone)]
pub struct HostSymbol {
    /// Name used by call instructions
    pub name: String,
    /// Address of an `extern "C"` function taking and returning `i64`s
    pub address: *const u8,
    /// Number of parameters
    pub arity: usize,
}

/// Cranelift-based JIT compiler backend
///
/// One backend compiles exactly one module; the resulting
/// [`CompiledModule`] owns the generated code.
pub struct CraneliftBackend {
    module: JITModule,
    ctx: Context,
    builder_ctx: FunctionBuilderContext,
    host_symbols: Vec<HostSymbol>,
}

/// Declared function: id and parameter count
#[derive(Debug, Clone, Copy)]
struct Declared {
    id: FuncId,
    arity: usize,
}

impl CraneliftBackend {
    /// Create a new Cranelift backend for the host ISA
    pub fn new(opt_level: OptLevel, host_symbols: Vec<HostSymbol>) -> Result<Self, CompileError> {
        let mut flag_builder = settings::builder();
        flag_builder
            .set("opt_level", opt_level.as_setting())
            .map_err(|e| CompileError::Isa(e.to_string()))?;
        flag_builder
            .set("is_pic", "false")
            .map_err(|e| CompileError::Isa(e.to_string()))?;

        let isa_builder = cranelift_native::builder().map_err(|e| CompileError::Isa(e.to_string()))?;
        let isa = isa_builder
            .finish(settings::Flags::new(flag_builder))
            .map_err(|e| CompileError::Isa(e.to_string()))?;

        let mut builder = JITBuilder::with_isa(isa, cranelift_module::default_libcall_names());
        for symbol in &host_symbols {
            builder.symbol(symbol.name.clone(), symbol.address);
        }
        let module = JITModule::new(builder);
        let ctx = module.make_context();

        Ok(Self {
            module,
            ctx,
            builder_ctx: FunctionBuilderContext::new(),
            host_symbols,
        })
    }

    /// Compile every function of the module to native code
    pub fn compile_module(mut self, ir: &IRModule) -> Result<CompiledModule, CompileError> {
        let declared = self.declare_functions(ir)?;

        for func in ir.functions() {
            self.define_function(func, &declared)?;
        }

        self.module.finalize_definitions()?;

        let mut entries = HashMap::new();
        for func in ir.functions() {
            let decl = declared[&func.name];
            let ptr = self.module.get_finalized_function(decl.id);
            entries.insert(
                func.name.clone(),
                EntrySlot {
                    ptr,
                    arity: decl.arity,
                },
            );
        }

        debug!(module = %ir.name, functions = entries.len(), "module compiled");

        Ok(CompiledModule {
            module: Some(self.module),
            entries,
        })
    }

    fn signature(&self, arity: usize) -> Signature {
        let mut sig = self.module.make_signature();
        for _ in 0..arity {
            sig.params.push(AbiParam::new(types::I64));
        }
        sig.returns.push(AbiParam::new(types::I64));
        sig
    }

    fn declare_functions(&mut self, ir: &IRModule) -> Result<HashMap<String, Declared>, CompileError> {
        let mut declared = HashMap::new();

        for func in ir.functions() {
            let sig = self.signature(func.param_count);
            let linkage = if func.exported { Linkage::Export } else { Linkage::Local };
            let id = self.module.declare_function(&func.name, linkage, &sig)?;
            declared.insert(
                func.name.clone(),
                Declared {
                    id,
                    arity: func.param_count,
                },
            );
        }

        for name in ir.external_callees() {
            let symbol = self
                .host_symbols
                .iter()
                .find(|s| s.name == name)
                .ok_or_else(|| CompileError::UnresolvedSymbol(name.clone()))?;
            let sig = self.signature(symbol.arity);
            let id = self.module.declare_function(&name, Linkage::Import, &sig)?;
            declared.insert(
                name,
                Declared {
                    id,
                    arity: symbol.arity,
                },
            );
        }

        Ok(declared)
    }

    fn define_function(&mut self, func: &IRFunction, declared: &HashMap<String, Declared>) -> Result<(), CompileError> {
        self.ctx.func.signature = self.signature(func.param_count);

        {
            let mut builder = FunctionBuilder::new(&mut self.ctx.func, &mut self.builder_ctx);

            let entry_block = builder.create_block();
            builder.append_block_params_for_function_params(entry_block);
            builder.switch_to_block(entry_block);

            let vars: Vec<Variable> = (0..func.registers.len())
                .map(|i| Variable::from_u32(i as u32))
                .collect();
            for var in &vars {
                builder.declare_var(*var, types::I64);
            }
            let params = builder.block_params(entry_block).to_vec();
            for (i, var) in vars.iter().enumerate() {
                let init = if i < func.param_count {
                    params[i]
                } else {
                    builder.ins().iconst(types::I64, 0)
                };
                builder.def_var(*var, init);
            }

            let blocks: Vec<Block> = func.labels.iter().map(|_| builder.create_block()).collect();
            let mut terminated = false;

            for inst in &func.instructions {
                if let IROpcode::Label(label) = inst.opcode {
                    let block = blocks[label.0 as usize];
                    if !terminated {
                        builder.ins().jump(block, &[]);
                    }
                    builder.switch_to_block(block);
                    terminated = false;
                    continue;
                }

                if terminated {
                    // Unreachable code after a jump or return.
                    let block = builder.create_block();
                    builder.switch_to_block(block);
                    terminated = false;
                }

                match &inst.opcode {
                    IROpcode::Mov { dst, src } => {
                        let value = operand(&mut builder, &vars, *src);
                        builder.def_var(vars[dst.0 as usize], value);
                    }
                    IROpcode::Binary { op, dst, lhs, rhs } => {
                        let a = operand(&mut builder, &vars, *lhs);
                        let b = operand(&mut builder, &vars, *rhs);
                        let value = match op {
                            BinaryOp::Add => builder.ins().iadd(a, b),
                            BinaryOp::Sub => builder.ins().isub(a, b),
                            BinaryOp::Mul => builder.ins().imul(a, b),
                            BinaryOp::Div => builder.ins().sdiv(a, b),
                            BinaryOp::Mod => builder.ins().srem(a, b),
                        };
                        builder.def_var(vars[dst.0 as usize], value);
                    }
                    IROpcode::Branch { cond, target, lhs, rhs } => {
                        let a = operand(&mut builder, &vars, *lhs);
                        let b = operand(&mut builder, &vars, *rhs);
                        let flag = builder.ins().icmp(int_cc(*cond), a, b);
                        let fallthrough = builder.create_block();
                        builder
                            .ins()
                            .brif(flag, blocks[target.0 as usize], &[], fallthrough, &[]);
                        builder.switch_to_block(fallthrough);
                    }
                    IROpcode::Jump(target) => {
                        builder.ins().jump(blocks[target.0 as usize], &[]);
                        terminated = true;
                    }
                    IROpcode::Call { callee, dst, args, .. } => {
                        let decl = declared
                            .get(callee)
                            .copied()
                            .ok_or_else(|| CompileError::UnresolvedSymbol(callee.clone()))?;
                        if decl.arity != args.len() {
                            return Err(CompileError::ArityMismatch {
                                caller: func.name.clone(),
                                callee: callee.clone(),
                                expected: decl.arity,
                                found: args.len(),
                            });
                        }
                        let func_ref = self.module.declare_func_in_func(decl.id, builder.func);
                        let arg_values: Vec<Value> = args
                            .iter()
                            .map(|a| operand(&mut builder, &vars, *a))
                            .collect();
                        let call = builder.ins().call(func_ref, &arg_values);
                        let result = builder.inst_results(call)[0];
                        if let Some(dst) = dst {
                            builder.def_var(vars[dst.0 as usize], result);
                        }
                    }
                    IROpcode::Ret(value) => {
                        let ret = match value {
                            Some(v) => operand(&mut builder, &vars, *v),
                            None => builder.ins().iconst(types::I64, 0),
                        };
                        builder.ins().return_(&[ret]);
                        terminated = true;
                    }
                    IROpcode::Label(_) => unreachable!("labels handled above"),
                }
            }

            // Falling off the end returns zero.
            if !terminated {
                let zero = builder.ins().iconst(types::I64, 0);
                builder.ins().return_(&[zero]);
            }

            builder.seal_all_blocks();
            builder.finalize();
        }

        let id = declared[&func.name].id;
        let result = self.module.define_function(id, &mut self.ctx);
        self.module.clear_context(&mut self.ctx);
        result?;
        Ok(())
    }
}

fn operand(builder: &mut FunctionBuilder<'_>, vars: &[Variable], op: Operand) -> Value {
    match op {
        Operand::Reg(r) => builder.use_var(vars[r.0 as usize]),
        Operand::Imm(v) => builder.ins().iconst(types::I64, v),
    }
}

fn int_cc(cond: CmpOp) -> IntCC {
    match cond {
        CmpOp::Eq => IntCC::Equal,
        CmpOp::Ne => IntCC::NotEqual,
        CmpOp::Lt => IntCC::SignedLessThan,
        CmpOp::Le => IntCC::SignedLessThanOrEqual,
        CmpOp::Gt => IntCC::SignedGreaterThan,
        CmpOp::Ge => IntCC::SignedGreaterThanOrEqual,
    }
}

#[derive(Debug, Clone, Copy)]
struct EntrySlot {
    ptr: *const u8,
    arity: usize,
}

/// Native code for one module
///
/// Owns the JIT memory; dropping it releases the generated code, so entry
/// points cannot outlive it.
pub struct CompiledModule {
    module: Option<JITModule>,
    entries: HashMap<String, EntrySlot>,
}

impl CompiledModule {
    /// Look up a callable entry point by function name
    pub fn entry(&self, name: &str) -> Result<EntryPoint<'_>, CompileError> {
        let (name, slot) = self
            .entries
            .get_key_value(name)
            .ok_or_else(|| CompileError::UnknownEntry(name.to_string()))?;
        Ok(EntryPoint {
            name: name.as_str(),
            ptr: slot.ptr,
            arity: slot.arity,
            _module: self,
        })
    }

    /// Names of all compiled functions
    pub fn function_names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

impl Drop for CompiledModule {
    fn drop(&mut self) {
        if let Some(module) = self.module.take() {
            // SAFETY: entry points borrow `self`, so no pointer into this
            // module's code can be live here.
            unsafe { module.free_memory() };
        }
    }
}

/// Callable native function
#[derive(Clone, Copy)]
pub struct EntryPoint<'m> {
    name: &'m str,
    ptr: *const u8,
    arity: usize,
    _module: &'m CompiledModule,
}

impl EntryPoint<'_> {
    /// Number of parameters
    pub fn arity(&self) -> usize {
        self.arity
    }

    /// Call the function with the given arguments
    pub fn invoke(&self, args: &[i64]) -> Result<i64, CompileError> {
        if args.len() != self.arity {
            return Err(CompileError::BadInvocation {
                name: self.name.to_string(),
                expected: self.arity,
                found: args.len(),
            });
        }

        // SAFETY: the pointer was produced by Cranelift for a function with
        // exactly `arity` i64 parameters and an i64 return, using the host's
        // default calling convention, and the owning module is still alive.
        let result = unsafe {
            match self.arity {
                0 => {
                    let f: extern "C" fn() -> i64 = std::mem::transmute(self.ptr);
                    f()
                }
                1 => {
                    let f: extern "C" fn(i64) -> i64 = std::mem::transmute(self.ptr);
                    f(args[0])
                }
                2 => {
                    let f: extern "C" fn(i64, i64) -> i64 = std::mem::transmute(self.ptr);
                    f(args[0], args[1])
                }
                3 => {
                    let f: extern "C" fn(i64, i64, i64) -> i64 = std::mem::transmute(self.ptr);
                    f(args[0], args[1], args[2])
                }
                4 => {
                    let f: extern "C" fn(i64, i64, i64, i64) -> i64 = std::mem::transmute(self.ptr);
                    f(args[0], args[1], args[2], args[3])
                }
                n => return Err(CompileError::UnsupportedArity(n)),
            }
        };
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_module;

    fn compile(src: &str) -> CompiledModule {
        let module = parse_module(src).unwrap();
        CraneliftBackend::new(OptLevel::Speed, Vec::new())
            .unwrap()
            .compile_module(&module)
            .unwrap()
    }

    #[test]
    fn test_cranelift_backend_creation() {
        assert!(CraneliftBackend::new(OptLevel::None, Vec::new()).is_ok());
    }

    #[test]
    fn test_compile_constant_return() {
        let compiled = compile("func f()\n  ret 42\nendfunc\n");
        assert_eq!(compiled.entry("f").unwrap().invoke(&[]).unwrap(), 42);
    }

    #[test]
    fn test_compile_arithmetic() {
        // (10 + 20) * 2 - 18 = 42
        let compiled = compile(
            "func f(a)\n  local t\n  add t, a, 20\n  mul t, t, 2\n  sub t, t, 18\n  ret t\nendfunc\n",
        );
        assert_eq!(compiled.entry("f").unwrap().invoke(&[10]).unwrap(), 42);
    }

    #[test]
    fn test_compile_division_and_modulo() {
        let compiled = compile(
            "func f(a, b)\n  local q, r\n  div q, a, b\n  mod r, a, b\n  mul q, q, 10\n  add q, q, r\n  ret q\nendfunc\n",
        );
        // 47 / 5 = 9, 47 % 5 = 2
        assert_eq!(compiled.entry("f").unwrap().invoke(&[47, 5]).unwrap(), 92);
    }

    #[test]
    fn test_compile_loop() {
        let compiled = compile(
            "\
func sum_to(n)
  local i, acc
loop:
  bge done, i, n
  add i, i, 1
  add acc, acc, i
  jmp loop
done:
  ret acc
endfunc
",
        );
        let entry = compiled.entry("sum_to").unwrap();
        assert_eq!(entry.invoke(&[10]).unwrap(), 55);
        assert_eq!(entry.invoke(&[0]).unwrap(), 0);
    }

    #[test]
    fn test_compile_calls() {
        let compiled = compile(
            "\
func sq(x)
  mul x, x, x
  ret x
endfunc
func f(a, b)
  local s, t
  call s, sq, a
  call t, sq, b
  add s, s, t
  ret s
endfunc
",
        );
        assert_eq!(compiled.entry("f").unwrap().invoke(&[3, 4]).unwrap(), 25);
    }

    #[test]
    fn test_missing_return_yields_zero() {
        let compiled = compile("func f(a)\n  add a, a, 1\nendfunc\n");
        assert_eq!(compiled.entry("f").unwrap().invoke(&[5]).unwrap(), 0);
    }

    #[test]
    fn test_unreachable_code_after_return() {
        let compiled = compile("func f()\n  ret 1\n  ret 2\nendfunc\n");
        assert_eq!(compiled.entry("f").unwrap().invoke(&[]).unwrap(), 1);
    }

    #[test]
    fn test_unresolved_symbol() {
        let module = parse_module("func f()\n  call _, nowhere\n  ret 0\nendfunc\n").unwrap();
        let result = CraneliftBackend::new(OptLevel::Speed, Vec::new())
            .unwrap()
            .compile_module(&module);
        assert!(matches!(result, Err(CompileError::UnresolvedSymbol(name)) if name == "nowhere"));
    }

    extern "C" fn host_double(x: i64) -> i64 {
        x * 2
    }

    #[test]
    fn test_host_symbol_call() {
        let module = parse_module("func f(a)\n  call a, double, a\n  ret a\nendfunc\n").unwrap();
        let symbols = vec![HostSymbol {
            name: "double".to_string(),
            address: host_double as *const u8,
            arity: 1,
        }];
        let compiled = CraneliftBackend::new(OptLevel::Speed, symbols)
            .unwrap()
            .compile_module(&module)
            .unwrap();
        assert_eq!(compiled.entry("f").unwrap().invoke(&[21]).unwrap(), 42);
    }

    #[test]
    fn test_arity_mismatch_is_compile_error() {
        let module = parse_module("func g(a, b)\n  ret a\nendfunc\nfunc f()\n  call _, g, 1\n  ret 0\nendfunc\n").unwrap();
        let result = CraneliftBackend::new(OptLevel::Speed, Vec::new())
            .unwrap()
            .compile_module(&module);
        assert!(matches!(result, Err(CompileError::ArityMismatch { expected: 2, found: 1, .. })));
    }

    #[test]
    fn test_bad_invocation() {
        let compiled = compile("func f(a)\n  ret a\nendfunc\n");
        let entry = compiled.entry("f").unwrap();
        assert_eq!(entry.arity(), 1);
        assert!(matches!(
            entry.invoke(&[]),
            Err(CompileError::BadInvocation { expected: 1, found: 0, .. })
        ));
        assert!(matches!(compiled.entry("g"), Err(CompileError::UnknownEntry(_))));
    }

    #[test]
    fn test_entry_outlives_lookup_name() {
        let compiled = compile("func f(a)\n  ret a\nendfunc\n");
        let entry = {
            let name = String::from("f");
            compiled.entry(&name).unwrap()
        };
        assert_eq!(entry.invoke(&[9]).unwrap(), 9);
        match entry.invoke(&[1, 2]) {
            Err(CompileError::BadInvocation { name, .. }) => assert_eq!(name, "f"),
            other => panic!("expected bad invocation, got {:?}", other.map(|_| ())),
        }
    }
}
