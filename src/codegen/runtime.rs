use std::collections::HashMap;

use cranelift_codegen::ir::{AbiParam, types};
use cranelift_module::{FuncId, Linkage, Module};

use crate::diagnostics::CompileError;
use crate::parser::ast::RuntimeFn;

pub const CHANSEND1: &str = "__chansel_chansend1";
pub const CHANRECV1: &str = "__chansel_chanrecv1";
pub const CHANRECV2: &str = "__chansel_chanrecv2";

/// Channel runtime entry points declared in the module. Booleans cross the
/// ABI as `i8`, everything else as a 64-bit word.
pub struct RuntimeRegistry {
    ids: HashMap<&'static str, FuncId>,
}

impl RuntimeRegistry {
    pub fn new(module: &mut dyn Module) -> Result<Self, CompileError> {
        let mut reg = RuntimeRegistry { ids: HashMap::new() };
        let (w, b) = (types::I64, types::I8);

        // Select
        reg.declare(module, RuntimeFn::Block.symbol(), &[], &[])?;
        reg.declare(module, RuntimeFn::SelectGo.symbol(), &[w, w, w, w, w, b], &[w, b])?;
        reg.declare(module, RuntimeFn::SelectNbSend.symbol(), &[w, w], &[b])?;
        reg.declare(module, RuntimeFn::SelectNbRecv.symbol(), &[w, w], &[b])?;
        reg.declare(module, RuntimeFn::SelectNbRecv2.symbol(), &[w, w, w], &[b])?;
        reg.declare(module, RuntimeFn::SelectSetPc.symbol(), &[w], &[])?;

        // Plain channel operations
        reg.declare(module, CHANSEND1, &[w, w], &[])?;
        reg.declare(module, CHANRECV1, &[w, w], &[])?;
        reg.declare(module, CHANRECV2, &[w, w], &[b])?;

        Ok(reg)
    }

    pub fn get(&self, name: &str) -> Result<FuncId, CompileError> {
        self.ids
            .get(name)
            .copied()
            .ok_or_else(|| CompileError::internal(format!("runtime function {name} not declared")))
    }

    pub fn runtime(&self, func: RuntimeFn) -> Result<FuncId, CompileError> {
        self.get(func.symbol())
    }

    pub fn is_runtime_symbol(&self, name: &str) -> bool {
        self.ids.contains_key(name)
    }

    fn declare(
        &mut self,
        module: &mut dyn Module,
        name: &'static str,
        params: &[types::Type],
        returns: &[types::Type],
    ) -> Result<(), CompileError> {
        let mut sig = module.make_signature();
        for &p in params {
            sig.params.push(AbiParam::new(p));
        }
        for &r in returns {
            sig.returns.push(AbiParam::new(r));
        }
        let id = module
            .declare_function(name, Linkage::Import, &sig)
            .map_err(|e| CompileError::codegen(format!("declare {name} error: {e}")))?;
        self.ids.insert(name, id);
        Ok(())
    }
}
