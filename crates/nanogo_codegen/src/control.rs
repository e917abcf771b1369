use inkwell::basic_block::BasicBlock;
use inkwell::values::{FunctionValue, IntValue};
use tracing::debug;

use nanogo_frontend::ast::{Else, Expr, ForHeader, ForStmt, IfStmt, Span};

use crate::error::{CodegenErrorKind, Result};
use crate::types::ValueType;
use crate::CodeGenerator;

fn block_name(block: BasicBlock<'_>) -> String {
    block.get_name().to_string_lossy().into_owned()
}

impl<'ctx> CodeGenerator<'ctx> {
    /// Whether the insertion block still accepts instructions.
    pub(crate) fn current_block_open(&self) -> bool {
        self.builder
            .get_insert_block()
            .is_some_and(|bb| bb.get_terminator().is_none())
    }

    pub(crate) fn append_block(&mut self, label: &str) -> Result<BasicBlock<'ctx>> {
        let function = self.function_state()?.function;
        let name = self.names.block(label);
        Ok(self.context.append_basic_block(function, &name))
    }

    /// Move the builder to `target`. The block being left must either be
    /// terminated or still empty.
    pub(crate) fn switch_to(&mut self, target: BasicBlock<'ctx>) -> Result<()> {
        if let Some(current) = self.builder.get_insert_block() {
            if current.get_terminator().is_none() && current.get_first_instruction().is_some() {
                return Err(
                    CodegenErrorKind::UnterminatedBlock(block_name(current)).at(Span::DUMMY)
                );
            }
        }
        self.builder.position_at_end(target);
        Ok(())
    }

    /// Branch to `target` unless the current block already ended.
    fn close_to(&mut self, target: BasicBlock<'ctx>) -> Result<()> {
        if self.current_block_open() {
            self.builder.build_unconditional_branch(target)?;
        }
        Ok(())
    }

    /// Code after a terminator gets a fresh block with no predecessors.
    pub(crate) fn ensure_open_block(&mut self) -> Result<()> {
        if !self.current_block_open() {
            let dead = self.append_block("dead")?;
            self.switch_to(dead)?;
        }
        Ok(())
    }

    /// Lower a branch condition; only comparison results qualify.
    fn lower_condition(&mut self, cond: &Expr) -> Result<IntValue<'ctx>> {
        let value = self.lower_expr(cond)?;
        match (value.ty, value.repr) {
            (ValueType::Bool, Some(repr)) => Ok(repr.into_int_value()),
            (ty, _) => Err(CodegenErrorKind::TypeMismatch(format!(
                "non-boolean condition of type {ty}"
            ))
            .at(cond.span)),
        }
    }

    /// ```text
    ///   br %cond, if.true, if.false | if.after
    /// if.true:
    ///   <then>
    ///   br if.after
    /// if.false:
    ///   <else>
    ///   br if.after
    /// if.after:
    /// ```
    pub(crate) fn lower_if(&mut self, stmt: &IfStmt) -> Result<()> {
        if let Some(init) = &stmt.init {
            self.lower_stmt(init)?;
        }
        let cond = self.lower_condition(&stmt.cond)?;

        let true_bb = self.append_block("if.true")?;
        let false_bb = match stmt.else_branch {
            Some(_) => Some(self.append_block("if.false")?),
            None => None,
        };
        let after_bb = self.append_block("if.after")?;
        self.builder
            .build_conditional_branch(cond, true_bb, false_bb.unwrap_or(after_bb))?;

        self.switch_to(true_bb)?;
        self.lower_block(&stmt.then_block)?;
        self.close_to(after_bb)?;

        if let (Some(false_bb), Some(else_branch)) = (false_bb, &stmt.else_branch) {
            self.switch_to(false_bb)?;
            match else_branch {
                Else::If(nested) => self.lower_if(nested)?,
                Else::Block(block) => self.lower_block(block)?,
            }
            self.close_to(after_bb)?;
        }

        self.switch_to(after_bb)
    }

    /// ```text
    ///   <init>
    ///   br for.cond
    /// for.cond:
    ///   br %cond, for.body, for.after
    /// for.body:
    ///   <body>
    ///   br for.post
    /// for.post:
    ///   <post>
    ///   br for.cond
    /// for.after:
    /// ```
    ///
    /// Without a condition the header is `for.body` itself; without a post
    /// statement the body branches straight back to the header.
    pub(crate) fn lower_for(&mut self, stmt: &ForStmt) -> Result<()> {
        let (init, cond, post) = match &stmt.header {
            ForHeader::Cond(cond) => (None, Some(cond), None),
            ForHeader::Clause { init, cond, post } => {
                (init.as_deref(), cond.as_ref(), post.as_deref())
            }
            ForHeader::Range => {
                return Err(CodegenErrorKind::UnknownConstruct("range clause".to_string())
                    .at(stmt.body.span));
            }
        };

        if let Some(init) = init {
            self.lower_stmt(init)?;
        }

        let cond_bb = match cond {
            Some(_) => Some(self.append_block("for.cond")?),
            None => None,
        };
        let body_bb = self.append_block("for.body")?;
        let post_bb = match post {
            Some(_) => Some(self.append_block("for.post")?),
            None => None,
        };
        let after_bb = self.append_block("for.after")?;
        let header = cond_bb.unwrap_or(body_bb);

        self.builder.build_unconditional_branch(header)?;

        if let (Some(cond_bb), Some(cond)) = (cond_bb, cond) {
            self.switch_to(cond_bb)?;
            let value = self.lower_condition(cond)?;
            self.builder
                .build_conditional_branch(value, body_bb, after_bb)?;
        } else {
            debug!("loop without condition; exit only through return");
        }

        self.switch_to(body_bb)?;
        self.lower_block(&stmt.body)?;

        match (post_bb, post) {
            (Some(post_bb), Some(post)) => {
                self.close_to(post_bb)?;
                self.switch_to(post_bb)?;
                self.lower_stmt(post)?;
                self.close_to(header)?;
            }
            _ => self.close_to(header)?,
        }

        self.switch_to(after_bb)
    }

    /// Every block of a finished function must end in exactly one terminator.
    pub(crate) fn check_terminators(&self, function: FunctionValue<'ctx>, span: Span) -> Result<()> {
        for block in function.get_basic_blocks() {
            if block.get_terminator().is_none() {
                return Err(CodegenErrorKind::UnterminatedBlock(block_name(block)).at(span));
            }
        }
        Ok(())
    }
}
