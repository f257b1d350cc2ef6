use std::collections::HashMap;

use cranelift_codegen::ir::condcodes::IntCC;
use cranelift_codegen::ir::{Block, InstBuilder, MemFlags, StackSlot, StackSlotData, StackSlotKind, Value, types};
use cranelift_frontend::FunctionBuilder;
use cranelift_module::{FuncId, Module};

use crate::diagnostics::CompileError;
use crate::parser::ast::*;
use crate::pretty::expr_to_string;
use crate::span::Spanned;
use crate::typeck::type_of;
use crate::typeck::types::Type;

use super::runtime::{CHANRECV1, CHANRECV2, CHANSEND1, RuntimeRegistry};

/// Machine type of a value of `ty`. Aggregates only live in memory.
pub fn scalar_type(ty: &Type) -> Option<types::Type> {
    match ty {
        Type::Bool | Type::Uint8 => Some(types::I8),
        Type::Uint16 => Some(types::I16),
        Type::Int | Type::Any | Type::Chan(..) | Type::UnsafePointer | Type::Uintptr | Type::Ptr(_) | Type::Nil => {
            Some(types::I64)
        }
        Type::Array(..) | Type::Struct(_) | Type::Invalid => None,
    }
}

fn create_slot(builder: &mut FunctionBuilder<'_>, ty: &Type) -> StackSlot {
    let size = ty.size().max(1) as u32;
    let align_shift = ty.align().max(1).trailing_zeros() as u8;
    builder.create_sized_stack_slot(StackSlotData::new(StackSlotKind::ExplicitSlot, size, align_shift))
}

struct LowerContext<'a, 'b> {
    builder: FunctionBuilder<'b>,
    module: &'a mut dyn Module,
    func_ids: &'a HashMap<String, FuncId>,
    runtime: &'a RuntimeRegistry,
    locals: &'a Locals,
    /// Every local lives in memory so its address can be taken.
    slots: HashMap<VarId, StackSlot>,
    /// Exit blocks of enclosing loops and select blocks, innermost last.
    break_targets: Vec<Block>,
}

impl LowerContext<'_, '_> {
    fn slot(&self, var: VarId) -> Result<StackSlot, CompileError> {
        self.slots
            .get(&var)
            .copied()
            .ok_or_else(|| CompileError::internal(format!("no stack slot for {}", self.locals.name(var))))
    }

    fn type_of(&self, expr: &Expr) -> Type {
        type_of(expr, self.locals)
    }

    fn scalar(&self, ty: &Type) -> Result<types::Type, CompileError> {
        scalar_type(ty).ok_or_else(|| CompileError::codegen(format!("a value of type {ty} cannot be held in a register")))
    }

    fn chan_elem(&self, channel: &Expr) -> Result<Type, CompileError> {
        match self.type_of(channel).chan_elem() {
            Some((_, elem)) => Ok(elem.clone()),
            None => Err(CompileError::internal(format!("{} is not a channel", expr_to_string(channel)))),
        }
    }

    /// Address of a fresh stack temporary sized for `ty`.
    fn scratch(&mut self, ty: &Type) -> Value {
        let slot = create_slot(&mut self.builder, ty);
        self.builder.ins().stack_addr(types::I64, slot, 0)
    }

    fn lower_stmts(&mut self, stmts: &[Spanned<Stmt>], terminated: &mut bool) -> Result<(), CompileError> {
        for stmt in stmts {
            if *terminated {
                break;
            }
            self.lower_stmt(&stmt.node, terminated)?;
        }
        Ok(())
    }

    fn lower_stmt(&mut self, stmt: &Stmt, terminated: &mut bool) -> Result<(), CompileError> {
        match stmt {
            Stmt::Var { value, var, name, .. } => {
                let var = var.ok_or_else(|| CompileError::internal(format!("unresolved declaration of {}", name.node)))?;
                match value {
                    Some(value) => {
                        let val = self.lower_expr(&value.node)?;
                        self.store_var(var, val)?;
                    }
                    None => self.zero_var(var)?,
                }
            }
            Stmt::Decl { var, init } => match init {
                DeclInit::Zero => self.zero_var(*var)?,
                DeclInit::Uninit => {}
                DeclInit::Value(value) => {
                    let val = self.lower_expr(&value.node)?;
                    self.store_var(*var, val)?;
                }
            },
            Stmt::Assign { lhs, rhs, .. } => self.lower_assign(lhs, rhs)?,
            Stmt::AssignRecv2 { value, ok, recv, .. } => self.lower_recv2(value, ok, recv)?,
            Stmt::Send { channel, value } => {
                let elem = self.chan_elem(&channel.node)?;
                let ch = self.lower_expr(&channel.node)?;
                let val = self.lower_expr(&value.node)?;
                let addr = self.scratch(&elem);
                self.builder.ins().store(MemFlags::trusted(), val, addr, 0);
                self.call_symbol(CHANSEND1, &[ch, addr])?;
            }
            Stmt::Expr(expr) => self.lower_effect(&expr.node)?,
            Stmt::If { cond, then_body, else_body } => {
                let cond_val = self.lower_expr(&cond.node)?;
                let then_bb = self.builder.create_block();
                let merge_bb = self.builder.create_block();

                if else_body.is_empty() {
                    self.builder.ins().brif(cond_val, then_bb, &[], merge_bb, &[]);
                    self.builder.switch_to_block(then_bb);
                    self.builder.seal_block(then_bb);
                    let mut then_terminated = false;
                    self.lower_stmts(then_body, &mut then_terminated)?;
                    if !then_terminated {
                        self.builder.ins().jump(merge_bb, &[]);
                    }
                } else {
                    let else_bb = self.builder.create_block();
                    self.builder.ins().brif(cond_val, then_bb, &[], else_bb, &[]);

                    self.builder.switch_to_block(then_bb);
                    self.builder.seal_block(then_bb);
                    let mut then_terminated = false;
                    self.lower_stmts(then_body, &mut then_terminated)?;
                    if !then_terminated {
                        self.builder.ins().jump(merge_bb, &[]);
                    }

                    self.builder.switch_to_block(else_bb);
                    self.builder.seal_block(else_bb);
                    let mut else_terminated = false;
                    self.lower_stmts(else_body, &mut else_terminated)?;
                    if !else_terminated {
                        self.builder.ins().jump(merge_bb, &[]);
                    }

                    if then_terminated && else_terminated {
                        *terminated = true;
                    }
                }

                if !*terminated {
                    self.builder.switch_to_block(merge_bb);
                    self.builder.seal_block(merge_bb);
                }
            }
            Stmt::For { cond, body } => {
                let header_bb = self.builder.create_block();
                let body_bb = self.builder.create_block();
                let exit_bb = self.builder.create_block();

                self.builder.ins().jump(header_bb, &[]);
                self.builder.switch_to_block(header_bb);
                match cond {
                    Some(cond) => {
                        let cond_val = self.lower_expr(&cond.node)?;
                        self.builder.ins().brif(cond_val, body_bb, &[], exit_bb, &[]);
                    }
                    None => {
                        self.builder.ins().jump(body_bb, &[]);
                    }
                }

                self.builder.switch_to_block(body_bb);
                self.builder.seal_block(body_bb);
                self.break_targets.push(exit_bb);
                let mut body_terminated = false;
                self.lower_stmts(body, &mut body_terminated)?;
                self.break_targets.pop();
                if !body_terminated {
                    self.builder.ins().jump(header_bb, &[]);
                }

                self.builder.seal_block(header_bb);
                self.builder.switch_to_block(exit_bb);
                self.builder.seal_block(exit_bb);
            }
            Stmt::Break => {
                let target = *self
                    .break_targets
                    .last()
                    .ok_or_else(|| CompileError::internal("break outside of a loop or select"))?;
                self.builder.ins().jump(target, &[]);
                *terminated = true;
            }
            Stmt::Breakable(body) => {
                let exit_bb = self.builder.create_block();
                self.break_targets.push(exit_bb);
                let mut body_terminated = false;
                self.lower_stmts(body, &mut body_terminated)?;
                self.break_targets.pop();
                if !body_terminated {
                    self.builder.ins().jump(exit_bb, &[]);
                }
                self.builder.switch_to_block(exit_bb);
                self.builder.seal_block(exit_bb);
            }
            // Slots are frame-allocated; nothing to release.
            Stmt::VarKill(_) => {}
            Stmt::Select(_) | Stmt::CheckedSelect(_) => {
                return Err(CompileError::internal("select reached codegen without being lowered"));
            }
        }
        Ok(())
    }

    fn lower_assign(&mut self, lhs: &[Spanned<Expr>], rhs: &[Spanned<Expr>]) -> Result<(), CompileError> {
        if lhs.len() == rhs.len() {
            // All right-hand sides are evaluated before any store.
            let mut values = Vec::with_capacity(rhs.len());
            for (target, value) in lhs.iter().zip(rhs) {
                if target.node.is_blank() {
                    self.lower_effect(&value.node)?;
                    values.push(None);
                } else {
                    values.push(Some(self.lower_expr(&value.node)?));
                }
            }
            for (target, value) in lhs.iter().zip(values) {
                if let Some(value) = value {
                    self.store_to(&target.node, value)?;
                }
            }
            return Ok(());
        }

        let [call] = rhs else {
            return Err(CompileError::internal(format!("cannot assign {} values to {} targets", rhs.len(), lhs.len())));
        };
        let results = self.lower_call(&call.node)?;
        if results.len() != lhs.len() {
            return Err(CompileError::internal(format!(
                "{} returns {} values, {} expected",
                expr_to_string(&call.node),
                results.len(),
                lhs.len()
            )));
        }
        for (target, value) in lhs.iter().zip(results) {
            if !target.node.is_blank() {
                self.store_to(&target.node, value)?;
            }
        }
        Ok(())
    }

    fn lower_recv2(&mut self, value: &Spanned<Expr>, ok: &Spanned<Expr>, recv: &Spanned<Expr>) -> Result<(), CompileError> {
        let Expr::Recv(channel) = &recv.node else {
            return Err(CompileError::internal("two-value receive without a receive expression"));
        };
        let elem = self.chan_elem(&channel.node)?;
        let ch = self.lower_expr(&channel.node)?;
        let addr = self.scratch(&elem);
        let received = self.call_symbol(CHANRECV2, &[ch, addr])?;
        let received = received
            .first()
            .copied()
            .ok_or_else(|| CompileError::internal("chanrecv2 returns no value"))?;

        if !value.node.is_blank() {
            let elem_ty = self.scalar(&elem)?;
            let loaded = self.builder.ins().load(elem_ty, MemFlags::trusted(), addr, 0);
            let target_ty = self.type_of(&value.node);
            let converted = self.convert(loaded, &elem, &target_ty)?;
            self.store_to(&value.node, converted)?;
        }
        if !ok.node.is_blank() {
            let ok_ty = self.type_of(&ok.node);
            let converted = self.convert(received, &Type::Bool, &ok_ty)?;
            self.store_to(&ok.node, converted)?;
        }
        Ok(())
    }

    /// Evaluate an expression for its side effects only.
    fn lower_effect(&mut self, expr: &Expr) -> Result<(), CompileError> {
        match expr {
            Expr::Call { .. } | Expr::Runtime { .. } => {
                self.lower_call(expr)?;
            }
            Expr::Recv(channel) => {
                self.lower_recv(&channel.node)?;
            }
            other => {
                self.lower_expr(other)?;
            }
        }
        Ok(())
    }

    fn lower_recv(&mut self, channel: &Expr) -> Result<Value, CompileError> {
        let elem = self.chan_elem(channel)?;
        let elem_ty = self.scalar(&elem)?;
        let ch = self.lower_expr(channel)?;
        let addr = self.scratch(&elem);
        self.call_symbol(CHANRECV1, &[ch, addr])?;
        Ok(self.builder.ins().load(elem_ty, MemFlags::trusted(), addr, 0))
    }

    fn lower_call(&mut self, expr: &Expr) -> Result<Vec<Value>, CompileError> {
        match expr {
            Expr::Call { func, args } => {
                let id = *self
                    .func_ids
                    .get(&func.node)
                    .ok_or_else(|| CompileError::codegen(format!("undeclared function {}", func.node)))?;
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    let val = self.lower_expr(&arg.node)?;
                    values.push(self.widen(val));
                }
                let func_ref = self.module.declare_func_in_func(id, self.builder.func);
                let call = self.builder.ins().call(func_ref, &values);
                Ok(self.builder.inst_results(call).to_vec())
            }
            Expr::Runtime { func, args } => {
                let id = self.runtime.runtime(*func)?;
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.lower_expr(&arg.node)?);
                }
                let func_ref = self.module.declare_func_in_func(id, self.builder.func);
                let call = self.builder.ins().call(func_ref, &values);
                Ok(self.builder.inst_results(call).to_vec())
            }
            other => Err(CompileError::internal(format!("{} is not a call", expr_to_string(other)))),
        }
    }

    fn call_symbol(&mut self, name: &str, args: &[Value]) -> Result<Vec<Value>, CompileError> {
        let id = self.runtime.get(name)?;
        let func_ref = self.module.declare_func_in_func(id, self.builder.func);
        let call = self.builder.ins().call(func_ref, args);
        Ok(self.builder.inst_results(call).to_vec())
    }

    fn lower_expr(&mut self, expr: &Expr) -> Result<Value, CompileError> {
        match expr {
            Expr::IntLit(n) => Ok(self.builder.ins().iconst(types::I64, *n)),
            Expr::BoolLit(b) => Ok(self.builder.ins().iconst(types::I8, i64::from(*b))),
            Expr::Nil => Ok(self.builder.ins().iconst(types::I64, 0)),
            Expr::Ident(ident) => {
                let var = ident
                    .var
                    .ok_or_else(|| CompileError::internal(format!("unresolved name {}", ident.name)))?;
                let ty = self.scalar(&self.locals.ty(var))?;
                let slot = self.slot(var)?;
                Ok(self.builder.ins().stack_load(ty, slot, 0))
            }
            Expr::Blank => Err(CompileError::internal("_ used as a value")),
            Expr::Call { .. } | Expr::Runtime { .. } => self
                .lower_call(expr)?
                .first()
                .copied()
                .ok_or_else(|| CompileError::internal(format!("{} produces no value", expr_to_string(expr)))),
            Expr::Recv(channel) => self.lower_recv(&channel.node),
            Expr::Unary { op, operand } => {
                let val = self.lower_expr(&operand.node)?;
                Ok(match op {
                    UnaryOp::Not => self.builder.ins().bxor_imm(val, 1),
                    UnaryOp::Neg => self.builder.ins().ineg(val),
                })
            }
            Expr::Binary { op: op @ (BinOp::And | BinOp::Or), lhs, rhs } => {
                let lhs_val = self.lower_expr(&lhs.node)?;
                let rhs_bb = self.builder.create_block();
                let merge_bb = self.builder.create_block();
                self.builder.append_block_param(merge_bb, types::I8);
                if *op == BinOp::And {
                    self.builder.ins().brif(lhs_val, rhs_bb, &[], merge_bb, &[lhs_val]);
                } else {
                    self.builder.ins().brif(lhs_val, merge_bb, &[lhs_val], rhs_bb, &[]);
                }
                self.builder.switch_to_block(rhs_bb);
                self.builder.seal_block(rhs_bb);
                let rhs_val = self.lower_expr(&rhs.node)?;
                self.builder.ins().jump(merge_bb, &[rhs_val]);
                self.builder.switch_to_block(merge_bb);
                self.builder.seal_block(merge_bb);
                Ok(self.builder.block_params(merge_bb)[0])
            }
            Expr::Binary { op, lhs, rhs } => {
                let l = self.lower_expr(&lhs.node)?;
                let r = self.lower_expr(&rhs.node)?;
                let cc = match op {
                    BinOp::Add => return Ok(self.builder.ins().iadd(l, r)),
                    BinOp::Sub => return Ok(self.builder.ins().isub(l, r)),
                    BinOp::Eq => IntCC::Equal,
                    BinOp::Neq => IntCC::NotEqual,
                    BinOp::Lt => IntCC::SignedLessThan,
                    BinOp::LtEq => IntCC::SignedLessThanOrEqual,
                    BinOp::Gt => IntCC::SignedGreaterThan,
                    BinOp::GtEq => IntCC::SignedGreaterThanOrEqual,
                    BinOp::And | BinOp::Or => {
                        return Err(CompileError::internal("logical operator reached the arithmetic path"));
                    }
                };
                Ok(self.builder.ins().icmp(cc, l, r))
            }
            Expr::Conv { expr: inner, to, .. } => {
                let from = self.type_of(&inner.node);
                let val = self.lower_expr(&inner.node)?;
                self.convert(val, &from, to)
            }
            // Pointer reinterpretation; the word is unchanged.
            Expr::ConvNop { expr: inner, .. } => self.lower_expr(&inner.node),
            Expr::AddrOf(inner) => self.lower_addr(&inner.node),
            Expr::Index { .. } | Expr::Field { .. } => {
                let ty = self.scalar(&self.type_of(expr))?;
                let addr = self.lower_addr(expr)?;
                Ok(self.builder.ins().load(ty, MemFlags::trusted(), addr, 0))
            }
        }
    }

    fn lower_addr(&mut self, expr: &Expr) -> Result<Value, CompileError> {
        match expr {
            Expr::Ident(Ident { var: Some(var), .. }) => {
                let slot = self.slot(*var)?;
                Ok(self.builder.ins().stack_addr(types::I64, slot, 0))
            }
            Expr::Index { base, index } => {
                let Type::Array(elem, len) = self.type_of(&base.node) else {
                    return Err(CompileError::internal(format!("{} is not an array", expr_to_string(&base.node))));
                };
                if *index >= len {
                    return Err(CompileError::internal(format!("index {index} out of range for [{len}]{elem}")));
                }
                let base_addr = self.lower_addr(&base.node)?;
                Ok(self.builder.ins().iadd_imm(base_addr, (*index * elem.size()) as i64))
            }
            Expr::Field { base, field } => {
                let Type::Struct(st) = self.type_of(&base.node) else {
                    return Err(CompileError::internal(format!("{} is not a struct", expr_to_string(&base.node))));
                };
                let offset = st
                    .field_offset(field)
                    .ok_or_else(|| CompileError::internal(format!("{} has no field {field}", st.name)))?;
                let base_addr = self.lower_addr(&base.node)?;
                Ok(self.builder.ins().iadd_imm(base_addr, offset as i64))
            }
            other => Err(CompileError::codegen(format!("cannot take the address of {}", expr_to_string(other)))),
        }
    }

    fn store_to(&mut self, target: &Expr, val: Value) -> Result<(), CompileError> {
        let addr = self.lower_addr(target)?;
        self.builder.ins().store(MemFlags::trusted(), val, addr, 0);
        Ok(())
    }

    fn store_var(&mut self, var: VarId, val: Value) -> Result<(), CompileError> {
        let slot = self.slot(var)?;
        self.builder.ins().stack_store(val, slot, 0);
        Ok(())
    }

    fn zero_var(&mut self, var: VarId) -> Result<(), CompileError> {
        let slot = self.slot(var)?;
        let size = self.locals.ty(var).size() as i32;
        let mut offset = 0;
        if size >= 8 {
            let zero = self.builder.ins().iconst(types::I64, 0);
            while offset + 8 <= size {
                self.builder.ins().stack_store(zero, slot, offset);
                offset += 8;
            }
        }
        if offset < size {
            let zero = self.builder.ins().iconst(types::I8, 0);
            while offset < size {
                self.builder.ins().stack_store(zero, slot, offset);
                offset += 1;
            }
        }
        Ok(())
    }

    fn convert(&mut self, val: Value, from: &Type, to: &Type) -> Result<Value, CompileError> {
        let src = self.scalar(from)?;
        let dst = self.scalar(to)?;
        if *to == Type::Bool && *from != Type::Bool {
            return Ok(self.builder.ins().icmp_imm(IntCC::NotEqual, val, 0));
        }
        Ok(if src == dst {
            val
        } else if src.bits() < dst.bits() {
            self.builder.ins().uextend(dst, val)
        } else {
            self.builder.ins().ireduce(dst, val)
        })
    }

    /// User and external functions take every argument as a 64-bit word.
    fn widen(&mut self, val: Value) -> Value {
        if self.builder.func.dfg.value_type(val) == types::I64 {
            val
        } else {
            self.builder.ins().uextend(types::I64, val)
        }
    }
}

pub fn lower_function(
    func: &Function,
    mut builder: FunctionBuilder<'_>,
    module: &mut dyn Module,
    func_ids: &HashMap<String, FuncId>,
    runtime: &RuntimeRegistry,
) -> Result<(), CompileError> {
    let entry_block = builder.create_block();
    builder.append_block_params_for_function_params(entry_block);
    builder.switch_to_block(entry_block);
    builder.seal_block(entry_block);

    let mut slots = HashMap::new();
    for (var, local) in func.locals.iter() {
        slots.insert(var, create_slot(&mut builder, &local.ty));
    }
    let params = builder.block_params(entry_block).to_vec();

    let mut ctx = LowerContext {
        builder,
        module,
        func_ids,
        runtime,
        locals: &func.locals,
        slots,
        break_targets: Vec::new(),
    };

    for (param, val) in func.params.iter().zip(params) {
        let var = param
            .var
            .ok_or_else(|| CompileError::internal(format!("unresolved parameter {}", param.name.node)))?;
        let ty = func.locals.ty(var);
        let val = ctx.convert(val, &Type::Int, &ty)?;
        ctx.store_var(var, val)?;
    }

    let mut terminated = false;
    ctx.lower_stmts(&func.body, &mut terminated)?;
    if !terminated {
        let zero = ctx.builder.ins().iconst(types::I64, 0);
        ctx.builder.ins().return_(&[zero]);
    }

    ctx.builder.seal_all_blocks();
    ctx.builder.finalize();
    Ok(())
}
