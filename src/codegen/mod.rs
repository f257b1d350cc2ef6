pub mod lower;
pub mod runtime;

use std::collections::{BTreeMap, HashMap, HashSet};

use cranelift_codegen::Context;
use cranelift_codegen::ir::{AbiParam, Signature, types};
use cranelift_codegen::settings::{self, Configurable};
use cranelift_frontend::{FunctionBuilder, FunctionBuilderContext};
use cranelift_module::{Linkage, Module};
use cranelift_object::{ObjectBuilder, ObjectModule};
use target_lexicon::Triple;
use tracing::debug;

use crate::diagnostics::CompileError;
use crate::parser::ast::*;
use crate::session::Session;
use crate::span::Spanned;
use crate::visit::{Visitor, walk_expr};
use lower::lower_function;
use runtime::RuntimeRegistry;

/// Triple used when the configuration names none.
pub fn host_triple() -> String {
    let arch = std::env::consts::ARCH;
    match std::env::consts::OS {
        "macos" => format!("{arch}-apple-darwin"),
        "windows" => format!("{arch}-pc-windows-msvc"),
        _ => format!("{arch}-unknown-linux-gnu"),
    }
}

/// Emit a relocatable object for a checked and lowered program.
pub fn codegen(program: &Program, session: &Session) -> Result<Vec<u8>, CompileError> {
    let mut flag_builder = settings::builder();
    flag_builder
        .set("is_pic", "true")
        .map_err(|e| CompileError::codegen(format!("invalid codegen flag: {e}")))?;

    let triple = session.options.target.clone().unwrap_or_else(host_triple);
    let parsed: Triple = triple
        .parse()
        .map_err(|e| CompileError::codegen(format!("invalid target {triple}: {e}")))?;
    let isa_builder = cranelift_codegen::isa::lookup(parsed)
        .map_err(|e| CompileError::codegen(format!("unsupported target {triple}: {e}")))?;
    let isa = isa_builder
        .finish(settings::Flags::new(flag_builder))
        .map_err(|e| CompileError::codegen(format!("ISA error: {e}")))?;

    let obj_builder = ObjectBuilder::new(isa, "chansel_module", cranelift_module::default_libcall_names())
        .map_err(|e| CompileError::codegen(format!("object builder error: {e}")))?;
    let mut module = ObjectModule::new(obj_builder);
    let runtime = RuntimeRegistry::new(&mut module)?;

    let mut func_ids = HashMap::new();
    let mut signatures = Vec::with_capacity(program.functions.len());
    for func in &program.functions {
        let name = &func.node.name.node;
        if runtime.is_runtime_symbol(name) {
            return Err(CompileError::codegen(format!("function {name} collides with a runtime symbol")));
        }
        let sig = word_signature(&module, func.node.params.len());
        let id = module
            .declare_function(name, Linkage::Export, &sig)
            .map_err(|e| CompileError::codegen(format!("declare {name} error: {e}")))?;
        func_ids.insert(name.clone(), id);
        signatures.push((id, sig));
    }

    for (name, arity) in collect_externs(program)? {
        let sig = word_signature(&module, arity);
        let id = module
            .declare_function(&name, Linkage::Import, &sig)
            .map_err(|e| CompileError::codegen(format!("declare {name} error: {e}")))?;
        func_ids.insert(name, id);
    }

    let mut builder_ctx = FunctionBuilderContext::new();
    for (func, (id, sig)) in program.functions.iter().zip(signatures) {
        let mut fn_ctx = Context::new();
        fn_ctx.func.signature = sig;
        {
            let builder = FunctionBuilder::new(&mut fn_ctx.func, &mut builder_ctx);
            lower_function(&func.node, builder, &mut module, &func_ids, &runtime)?;
        }
        module
            .define_function(id, &mut fn_ctx)
            .map_err(|e| CompileError::codegen(format!("define {} error: {e:?}", func.node.name.node)))?;
        debug!(function = %func.node.name.node, "defined function");
    }

    let object = module.finish();
    object.emit().map_err(|e| CompileError::codegen(format!("emit error: {e}")))
}

/// `arity` word-sized parameters and a single word result.
fn word_signature(module: &ObjectModule, arity: usize) -> Signature {
    let mut sig = module.make_signature();
    for _ in 0..arity {
        sig.params.push(AbiParam::new(types::I64));
    }
    sig.returns.push(AbiParam::new(types::I64));
    sig
}

/// Called names with no definition in the program, with their argument counts.
fn collect_externs(program: &Program) -> Result<BTreeMap<String, usize>, CompileError> {
    let defined = program.functions.iter().map(|f| f.node.name.node.clone()).collect();
    let mut collector = ExternCollector { defined, externs: BTreeMap::new(), error: None };
    collector.visit_program(program);
    match collector.error {
        Some(err) => Err(err),
        None => Ok(collector.externs),
    }
}

struct ExternCollector {
    defined: HashSet<String>,
    externs: BTreeMap<String, usize>,
    error: Option<CompileError>,
}

impl Visitor for ExternCollector {
    fn visit_expr(&mut self, expr: &Spanned<Expr>) {
        if let Expr::Call { func, args } = &expr.node {
            if !self.defined.contains(&func.node) {
                let arity = *self.externs.entry(func.node.clone()).or_insert(args.len());
                if arity != args.len() && self.error.is_none() {
                    self.error = Some(CompileError::codegen(format!(
                        "external function {} called with {} and {} arguments",
                        func.node,
                        arity,
                        args.len()
                    )));
                }
            }
        }
        walk_expr(self, expr);
    }
}
