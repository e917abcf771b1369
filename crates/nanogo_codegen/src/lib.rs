pub mod builtins;
pub mod control;
pub mod error;
pub mod expr;
pub mod function;
pub mod naming;
pub mod scope;
pub mod stmt;
pub mod symbols;
pub mod types;
pub mod value;

use inkwell::builder::Builder;
use inkwell::context::Context;
use inkwell::module::Module;
use inkwell::values::FunctionValue;
use tracing::{debug, info};

use nanogo_frontend::ast::{Decl, FuncDecl, SourceFile};

use crate::builtins::Builtins;
use crate::naming::NameGen;
use crate::scope::ScopeStack;
use crate::symbols::SymbolTable;
use crate::types::{GoType, TypeRegistry};

pub use crate::builtins::WriteStrategy;
pub use crate::error::{CodegenError, CodegenErrorKind, Result};

/// Knobs that change the shape of the generated module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodegenOptions {
    /// Name of the function that begins execution.
    pub entry_point: String,
    pub write_strategy: WriteStrategy,
}

impl Default for CodegenOptions {
    fn default() -> Self {
        Self {
            entry_point: "main".to_string(),
            write_strategy: WriteStrategy::default(),
        }
    }
}

/// State of the function whose body is being lowered.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FunctionState<'ctx> {
    pub function: FunctionValue<'ctx>,
    pub ret: Option<GoType>,
    pub is_entry: bool,
}

/// The code generator. Holds the LLVM module and builder together with the
/// scope stack, symbol table and name counters of one compilation unit.
///
/// Usage:
/// ```ignore
/// let context = Context::create();
/// let codegen = CodeGenerator::new(&context, "main", CodegenOptions::default());
/// let module = codegen.compile(&source_file)?;
/// ```
pub struct CodeGenerator<'ctx> {
    context: &'ctx Context,
    module: Module<'ctx>,
    builder: Builder<'ctx>,
    registry: TypeRegistry<'ctx>,
    builtins: Builtins<'ctx>,
    options: CodegenOptions,
    scopes: ScopeStack<'ctx>,
    symbols: SymbolTable<'ctx>,
    names: NameGen,
    current: Option<FunctionState<'ctx>>,
}

impl<'ctx> CodeGenerator<'ctx> {
    pub fn new(context: &'ctx Context, module_name: &str, options: CodegenOptions) -> Self {
        let module = context.create_module(module_name);
        let builder = context.create_builder();
        let registry = TypeRegistry::new(context);
        let builtins = Builtins::new(context, options.write_strategy);

        Self {
            context,
            module,
            builder,
            registry,
            builtins,
            options,
            scopes: ScopeStack::new(),
            symbols: SymbolTable::new(),
            names: NameGen::new(),
            current: None,
        }
    }

    /// Lower a whole source file.
    ///
    /// 1. Declare every function signature.
    /// 2. Lower every body except the entry point, in source order.
    /// 3. Lower the entry point.
    ///
    /// The first error aborts the pass and the partially built module is
    /// dropped with the generator.
    pub fn compile(mut self, file: &SourceFile) -> Result<Module<'ctx>> {
        info!(package = %file.package, decls = file.decls.len(), "lowering package");
        self.builtins.declare_all(&self.module);

        let mut funcs: Vec<&FuncDecl> = Vec::with_capacity(file.decls.len());
        for decl in &file.decls {
            match decl {
                Decl::Func(func) => funcs.push(func),
                Decl::Unsupported { construct, span } => {
                    return Err(CodegenErrorKind::UnknownConstruct(construct.clone()).at(*span));
                }
            }
        }

        for func in &funcs {
            self.declare_function(func)?;
        }
        if self.symbols.is_empty() {
            debug!("package declares no functions");
        }

        let (entry, others): (Vec<&FuncDecl>, Vec<&FuncDecl>) = funcs
            .into_iter()
            .partition(|f| f.name.name == self.options.entry_point);

        for func in others {
            self.lower_function(func)?;
        }
        match entry.first() {
            Some(func) => self.lower_function(func)?,
            None => debug!(entry = %self.options.entry_point, "no entry point in package"),
        }

        info!(functions = self.symbols.len(), "package lowered");
        Ok(self.module)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inkwell::execution_engine::{ExecutionEngine, JitFunction};
    use inkwell::targets::{InitializationConfig, Target};
    use inkwell::OptimizationLevel;
    use nanogo_frontend::ast::{
        BinaryOp, Block, Expr, ForHeader, ForStmt, IfStmt, Else, IncDecOp, Param, Stmt,
        StmtKind, TypeExpr, UnaryOp,
    };
    use nanogo_frontend::ast::Ident;
    use nanogo_frontend::parse_source;

    type I64Fn = unsafe extern "C" fn() -> i64;
    type I32Fn = unsafe extern "C" fn() -> i32;

    fn compile_src<'ctx>(context: &'ctx Context, src: &str) -> Result<Module<'ctx>> {
        let file = parse_source(src).expect("test source parses");
        CodeGenerator::new(context, "test", CodegenOptions::default()).compile(&file)
    }

    fn compile_ok<'ctx>(context: &'ctx Context, src: &str) -> Module<'ctx> {
        let module = compile_src(context, src).expect("lowering succeeds");
        if let Err(msg) = module.verify() {
            panic!("module failed verification: {}\n{}", msg.to_string(), module.print_to_string().to_string());
        }
        module
    }

    fn compile_err(src: &str) -> CodegenError {
        let context = Context::create();
        match compile_src(&context, src) {
            Ok(module) => panic!("expected an error, got:\n{}", module.print_to_string().to_string()),
            Err(err) => err,
        }
    }

    fn engine<'ctx>(module: &Module<'ctx>) -> ExecutionEngine<'ctx> {
        Target::initialize_native(&InitializationConfig::default()).expect("native target");
        module
            .create_jit_execution_engine(OptimizationLevel::None)
            .expect("jit engine")
    }

    /// JIT the module and call the zero-argument `i64` function `name`.
    fn run_i64(src: &str, name: &str) -> i64 {
        let context = Context::create();
        let module = compile_ok(&context, src);
        let engine = engine(&module);
        unsafe {
            let f: JitFunction<I64Fn> = engine.get_function(name).expect("function exists");
            f.call()
        }
    }

    fn ir_of(src: &str) -> String {
        let context = Context::create();
        compile_ok(&context, src).print_to_string().to_string()
    }

    fn func(name: &str, params: Vec<(&str, &str)>, ret: Option<&str>, stmts: Vec<Stmt>) -> Decl {
        Decl::Func(FuncDecl {
            name: Ident::new(name),
            params: params
                .into_iter()
                .map(|(n, t)| Param {
                    name: Ident::new(n),
                    ty: TypeExpr::named(t),
                })
                .collect(),
            results: ret.into_iter().map(TypeExpr::named).collect(),
            body: Block::new(stmts),
            span: Default::default(),
        })
    }

    fn file(decls: Vec<Decl>) -> SourceFile {
        SourceFile {
            package: "main".to_string(),
            decls,
        }
    }

    fn stmt(kind: StmtKind) -> Stmt {
        Stmt::new(kind)
    }

    #[test]
    fn test_empty_program() {
        let context = Context::create();
        let module = CodeGenerator::new(&context, "test", CodegenOptions::default())
            .compile(&file(vec![]))
            .unwrap();
        assert!(module.verify().is_ok());
        assert!(module.get_function("printf").is_some());
    }

    #[test]
    fn test_simple_add_function() {
        let context = Context::create();
        let program = file(vec![func(
            "add",
            vec![("a", "int32"), ("b", "int32")],
            Some("int32"),
            vec![stmt(StmtKind::Return(vec![Expr::binary(
                BinaryOp::Add,
                Expr::ident("a"),
                Expr::ident("b"),
            )]))],
        )]);
        let module = CodeGenerator::new(&context, "test", CodegenOptions::default())
            .compile(&program)
            .unwrap();
        assert!(module.verify().is_ok());
        let add = module.get_function("add").unwrap();
        assert_eq!(add.count_params(), 2);
        assert!(add.get_type().get_return_type().unwrap().into_int_type().get_bit_width() == 32);
    }

    #[test]
    fn test_arithmetic_and_bitwise_results() {
        let cases = [
            ("3 + 4", 7),
            ("10 - 3", 7),
            ("6 * 7", 42),
            ("20 / 4", 5),
            ("5 << 1", 10),
            ("-8 >> 1", -4),
            ("5 & 3", 1),
            ("5 | 2", 7),
        ];
        for (expr, expected) in cases {
            let src = format!("package main\nfunc f() int64 {{ return {expr} }}\n");
            assert_eq!(run_i64(&src, "f"), expected, "{expr}");
        }
    }

    #[test]
    fn test_unary_minus_both_widths() {
        let src = "package main
func neg64() int64 { x := 9; return -x }
func neg32() int64 { var y int32 = 9; var z int32 = -y; return z }
";
        assert_eq!(run_i64(src, "neg64"), -9);
        assert_eq!(run_i64(src, "neg32"), -9);
        let ir = ir_of(src);
        assert!(ir.contains("sub i32 0,"), "{ir}");
        assert!(ir.contains("sub i64 0,"), "{ir}");
    }

    #[test]
    fn test_most_negative_literal() {
        let src = "package main
func lowest() int64 { x := -9223372036854775808; return x }
";
        assert_eq!(run_i64(src, "lowest"), i64::MIN);

        let err = compile_err("package main\nfunc f() int64 { return -9223372036854775809 }\n");
        assert!(matches!(err.kind, CodegenErrorKind::UnsupportedLiteralKind(_)), "{err}");
    }

    #[test]
    fn test_unsupported_operators_rejected() {
        for op in ["%", "^", "&^", "&&", "||"] {
            let src = format!("package main\nfunc f() int64 {{ return 7 {op} 3 }}\n");
            let err = compile_err(&src);
            assert!(
                matches!(err.kind, CodegenErrorKind::UnsupportedOperator(ref t) if t == op),
                "{op}: {err}"
            );
        }
    }

    #[test]
    fn test_illegal_operator_emits_nothing() {
        let context = Context::create();
        let program = file(vec![func(
            "f",
            vec![],
            Some("int64"),
            vec![stmt(StmtKind::Return(vec![Expr::binary(
                BinaryOp::Rem,
                Expr::call("g", vec![]),
                Expr::int(3),
            )]))],
        )]);
        let mut codegen = CodeGenerator::new(&context, "test", CodegenOptions::default());
        codegen.builtins.declare_all(&codegen.module);
        let decl = match &program.decls[0] {
            Decl::Func(f) => f,
            _ => unreachable!(),
        };
        codegen.declare_function(decl).unwrap();
        let err = codegen.lower_function(decl).unwrap_err();
        assert!(matches!(err.kind, CodegenErrorKind::UnsupportedOperator(_)));
        // `g` would be unbound, but the operator is rejected before either side.
        let entry = codegen.module.get_function("f").unwrap().get_first_basic_block().unwrap();
        assert!(entry.get_first_instruction().is_none());
    }

    #[test]
    fn test_relational_operators_branch() {
        let cases = [
            ("1 < 2", 1),
            ("2 < 1", 0),
            ("2 > 1", 1),
            ("2 <= 2", 1),
            ("3 <= 2", 0),
            ("2 >= 3", 0),
            ("2 == 2", 1),
            ("2 != 2", 0),
            ("-1 < 0", 1),
        ];
        for (cond, expected) in cases {
            let src =
                format!("package main\nfunc f() int64 {{ if {cond} {{ return 1 }}\nreturn 0 }}\n");
            assert_eq!(run_i64(&src, "f"), expected, "{cond}");
        }
    }

    #[test]
    fn test_comparison_evaluates_both_operands() {
        let src = "package main
func one() int64 { Print(\"a\"); return 1 }
func two() int64 { Print(\"b\"); return 2 }
func f() int64 {
    if one() > two() { return 1 }
    return 0
}
";
        let ir = ir_of(src);
        let f_body = ir.split("define i64 @f()").nth(1).unwrap();
        assert!(f_body.contains("call i64 @one()"));
        assert!(f_body.contains("call i64 @two()"));
    }

    #[test]
    fn test_declaration_assignment_incdec() {
        let src = "package main
func decl() int64 { x := 41; return x }
func reassign() int64 { x := 1; x = 99; return x }
func inc() int64 { x := 10; x++; return x }
func dec() int64 { x := 10; x--; return x }
func inc32() int64 { var x int32 = 7; x++; return x }
func compound() int64 { x := 6; x *= 7; return x }
";
        assert_eq!(run_i64(src, "decl"), 41);
        assert_eq!(run_i64(src, "reassign"), 99);
        assert_eq!(run_i64(src, "inc"), 11);
        assert_eq!(run_i64(src, "dec"), 9);
        assert_eq!(run_i64(src, "inc32"), 8);
        assert_eq!(run_i64(src, "compound"), 42);
    }

    #[test]
    fn test_var_zero_values() {
        let src = "package main
func zi() int64 { var x int64; return x }
func zs() int64 { var s string; Print(s); return 3 }
";
        assert_eq!(run_i64(src, "zi"), 0);
        let ir = ir_of(src);
        assert!(ir.contains("@str.empty"), "{ir}");
    }

    #[test]
    fn test_if_else_chain_takes_one_branch() {
        let src = "package main
func classify(n int64) int64 {
    r := 0
    if n < 0 {
        r = 1
    } else if n == 0 {
        r = 2
    } else {
        r = 3
    }
    return r
}
func neg() int64 { return classify(-5) }
func zero() int64 { return classify(0) }
func pos() int64 { return classify(5) }
";
        assert_eq!(run_i64(src, "neg"), 1);
        assert_eq!(run_i64(src, "zero"), 2);
        assert_eq!(run_i64(src, "pos"), 3);

        let context = Context::create();
        let module = compile_ok(&context, src);
        let classify = module.get_function("classify").unwrap();
        for bb in classify.get_basic_blocks() {
            assert!(bb.get_terminator().is_some());
        }
        // One join per `if`, and the inner join feeds the outer one.
        let joins = classify
            .get_basic_blocks()
            .iter()
            .filter(|bb| bb.get_name().to_string_lossy().starts_with("if.after"))
            .count();
        assert_eq!(joins, 2);
    }

    #[test]
    fn test_if_without_else_uses_join_as_false() {
        let ir = ir_of(
            "package main
func f(a int64) int64 { if a > 0 { a = 0 }\nreturn a }
",
        );
        assert!(!ir.contains("if.false"), "{ir}");
        assert!(ir.contains("if.true"), "{ir}");
    }

    #[test]
    fn test_both_branches_return() {
        let src = "package main
func max(a int32, b int32) int32 {
    if a > b {
        return a
    } else {
        return b
    }
}
func f() int64 { return max(3, 9) }
";
        assert_eq!(run_i64(src, "f"), 9);
        assert!(ir_of(src).contains("unreachable"));
    }

    #[test]
    fn test_missing_return_rejected() {
        let sources = [
            "package main\nfunc f(a int64) int64 {\n    if a > 0 { return 1 }\n}\n",
            "package main\nfunc g() int64 {\n    x := 1\n}\n",
            "package main\nfunc h() int32 {\n}\n",
        ];
        for src in sources {
            let err = compile_err(src);
            assert!(
                matches!(err.kind, CodegenErrorKind::TypeMismatch(ref m) if m == "missing return"),
                "{src}: {err}"
            );
            assert_eq!(err.span.line, 2, "{src}");
        }
    }

    #[test]
    fn test_for_loops() {
        let src = "package main
func never() int64 {
    n := 0
    for n > 0 { n = n + 100 }
    return n
}
func five() int64 {
    count := 0
    i := 0
    for i = 0; i < 5; i++ { count++ }
    return count * 10 + i
}
func clause_decl() int64 {
    total := 0
    for j := 0; j < 4; j++ { total += j }
    return total
}
func infinite_with_return() int64 {
    k := 0
    for {
        k++
        if k == 3 { return k }
    }
}
";
        assert_eq!(run_i64(src, "never"), 0);
        assert_eq!(run_i64(src, "five"), 55);
        assert_eq!(run_i64(src, "clause_decl"), 6);
        assert_eq!(run_i64(src, "infinite_with_return"), 3);
    }

    #[test]
    fn test_for_without_condition_branches_into_body() {
        let ir = ir_of(
            "package main
func f() int64 { k := 0\nfor { k++\nif k > 2 { return k } } }
",
        );
        assert!(!ir.contains("for.cond"), "{ir}");
        assert!(ir.contains("for.body"), "{ir}");
    }

    #[test]
    fn test_break_continue_rejected() {
        let err = compile_err("package main\nfunc f() { for { break } }\n");
        assert!(matches!(err.kind, CodegenErrorKind::UnknownConstruct(ref c) if c.contains("break")));
        let err = compile_err("package main\nfunc f() { for { continue } }\n");
        assert!(matches!(err.kind, CodegenErrorKind::UnknownConstruct(ref c) if c.contains("continue")));
    }

    #[test]
    fn test_string_literal_record() {
        let src = "package main
func f() int64 { s := \"hello\"; Print(s); return 0 }
";
        let ir = ir_of(src);
        assert!(ir.contains("@str.0 = private unnamed_addr constant [6 x i8] c\"hello\\00\""), "{ir}");
        assert!(ir.contains("store i64 5"), "{ir}");
    }

    #[test]
    fn test_string_literals_are_not_interned() {
        let ir = ir_of(
            "package main
func f() { Print(\"x\")\nPrint(\"x\") }
",
        );
        assert!(ir.contains("@str.0"));
        assert!(ir.contains("@str.1"));
    }

    #[test]
    fn test_string_pointer_addresses_bytes() {
        #[repr(C)]
        struct GoString {
            len: i64,
            ptr: *const u8,
        }

        let context = Context::create();
        let module = compile_ok(
            &context,
            "package main\nfunc greet() string { s := \"hey\\tyou\"\nreturn s }\n",
        );
        let engine = engine(&module);
        let record = unsafe {
            let f: JitFunction<unsafe extern "C" fn() -> GoString> =
                engine.get_function("greet").unwrap();
            f.call()
        };
        assert_eq!(record.len, 7);
        let bytes = unsafe { std::slice::from_raw_parts(record.ptr, 8) };
        assert_eq!(&bytes[..7], b"hey\tyou");
        assert_eq!(bytes[7], 0);
    }

    #[test]
    fn test_forward_reference_resolves() {
        let src = "package main
func a() int64 { return b() + 1 }
func b() int64 { return 41 }
";
        assert_eq!(run_i64(src, "a"), 42);
    }

    #[test]
    fn test_print_issues_one_write() {
        let src = "package main
func main() {
    Print(\"hi there\")
}
";
        let ir = ir_of(src);
        assert_eq!(ir.matches("call i64 @write(").count(), 1, "{ir}");
        assert!(ir.contains("declare i64 @write(i32, ptr, i64)"), "{ir}");
        // fd 1, the literal's data pointer and its 8-byte length.
        assert!(ir.contains("call i64 @write(i32 1, ptr %str.ptr, i64 %str.len)"), "{ir}");
        assert!(ir.contains("store i64 8, ptr %lit.len"), "{ir}");
        assert!(ir.contains("%str.len = extractvalue %nanogo.string %str.0, 0"), "{ir}");
    }

    #[test]
    fn test_print_syscall_strategy() {
        let context = Context::create();
        let file = parse_source("package main\nfunc main() { Print(\"x\") }\n").unwrap();
        let options = CodegenOptions {
            write_strategy: WriteStrategy::LinuxSyscall,
            ..Default::default()
        };
        let module = CodeGenerator::new(&context, "test", options).compile(&file).unwrap();
        assert!(module.verify().is_ok());
        let ir = module.print_to_string().to_string();
        assert!(ir.contains("asm sideeffect \"syscall\", \"=r,{rax},{rdi},{rsi},{rdx}\""), "{ir}");
        assert!(module.get_function("write").is_none());
    }

    #[test]
    fn test_printf_forwards_pointer_only() {
        let src = "package main
func main() {
    n := 3
    Printf(\"%d\\n\", n)
}
";
        let ir = ir_of(src);
        assert!(ir.contains("declare i32 @printf(ptr, ...)"), "{ir}");
        assert!(ir.contains("extractvalue %nanogo.string"), "{ir}");
        // The length field is never read for the format argument.
        assert!(!ir.contains("%str.len"), "{ir}");
        let call = ir
            .lines()
            .find(|l| l.contains("call i32 (ptr, ...) @printf("))
            .unwrap();
        assert!(call.contains("(ptr %str.ptr, i64 "), "{call}");
    }

    #[test]
    fn test_main_returns_status() {
        let context = Context::create();
        let module = compile_ok(&context, "package main\nfunc main() { x := 1\nx++ }\n");
        let main = module.get_function("main").unwrap();
        assert_eq!(main.count_params(), 0);
        let engine = engine(&module);
        let status = unsafe {
            let f: JitFunction<I32Fn> = engine.get_function("main").unwrap();
            f.call()
        };
        assert_eq!(status, 0);
    }

    #[test]
    fn test_non_identifier_assignment_rejected() {
        let context = Context::create();
        let program = file(vec![func(
            "main",
            vec![],
            None,
            vec![stmt(StmtKind::Assign {
                targets: vec![Expr::unary(UnaryOp::Deref, Expr::ident("p"))],
                op: None,
                values: vec![Expr::int(1)],
            })],
        )]);
        let err = CodeGenerator::new(&context, "test", CodegenOptions::default())
            .compile(&program)
            .unwrap_err();
        assert!(matches!(err.kind, CodegenErrorKind::UnsupportedStatementForm(_)));
    }

    #[test]
    fn test_unbound_identifier_rejected() {
        let err = compile_err("package main\nfunc main() {\n  y = 3\n}\n");
        assert!(matches!(err.kind, CodegenErrorKind::UnboundIdentifier(ref n) if n == "y"));
        assert_eq!(err.span.line, 3);
    }

    #[test]
    fn test_unsupported_forms() {
        let err = compile_err("package main\nfunc f() (int64, int64) { return 1, 2 }\n");
        assert!(matches!(err.kind, CodegenErrorKind::UnknownConstruct(_)), "{err}");

        let err = compile_err("package main\nfunc f() int64 { return 1, 2 }\n");
        assert!(matches!(err.kind, CodegenErrorKind::UnsupportedStatementForm(_)), "{err}");

        let err = compile_err("package main\nfunc f() { a, b := 1, 2 }\n");
        assert!(matches!(err.kind, CodegenErrorKind::UnsupportedStatementForm(_)), "{err}");

        let err = compile_err("package main\nfunc f() float64 { return 1 }\n");
        assert!(matches!(err.kind, CodegenErrorKind::UnknownType(ref t) if t == "float64"), "{err}");

        let err = compile_err("package main\nfunc f() int64 { x := 1.5\nreturn 0 }\n");
        assert!(matches!(err.kind, CodegenErrorKind::UnsupportedLiteralKind(_)), "{err}");

        let err = compile_err("package main\nimport \"fmt\"\nfunc main() {}\n");
        assert!(matches!(err.kind, CodegenErrorKind::UnknownConstruct(_)), "{err}");
    }

    #[test]
    fn test_duplicate_and_arity() {
        let err = compile_err("package main\nfunc f() {}\nfunc f() {}\n");
        assert!(matches!(err.kind, CodegenErrorKind::DuplicateFunction(ref n) if n == "f"));

        let err = compile_err("package main\nfunc g(a int64) {}\nfunc main() { g(1, 2) }\n");
        assert!(matches!(
            err.kind,
            CodegenErrorKind::ArityMismatch { expected: 1, found: 2, .. }
        ));
    }

    #[test]
    fn test_type_mismatch() {
        let err = compile_err("package main\nfunc f() int64 { return \"x\" }\n");
        assert!(matches!(err.kind, CodegenErrorKind::TypeMismatch(_)), "{err}");

        let err = compile_err("package main\nfunc f() { Print(3) }\n");
        assert!(matches!(err.kind, CodegenErrorKind::TypeMismatch(_)), "{err}");
    }

    #[test]
    fn test_width_conversion() {
        let src = "package main
func narrow(v int32) int32 { return v }
func f() int64 {
    var big int64 = 4294967297
    return narrow(big)
}
func mixed() int64 {
    var a int32 = 2
    var b int64 = 40
    return a + b
}
";
        assert_eq!(run_i64(src, "f"), 1);
        assert_eq!(run_i64(src, "mixed"), 42);
    }

    #[test]
    fn test_dead_code_after_return() {
        let src = "package main
func f() int64 {
    return 1
    x := 2
    return x
}
";
        assert_eq!(run_i64(src, "f"), 1);
    }

    #[test]
    fn test_nested_blocks_and_if_init() {
        let src = "package main
func f() int64 {
    r := 0
    {
        r = 5
    }
    if v := r * 2; v > 8 {
        r = v
    }
    return r
}
";
        assert_eq!(run_i64(src, "f"), 10);
    }

    #[test]
    fn test_separate_generators_restart_names() {
        let src = "package main\nfunc f() { Print(\"a\") }\nfunc g() { Print(\"b\") }\n";
        let first = ir_of(src);
        assert!(first.contains("@str.1"));
        assert!(!first.contains("@str.2"));
        assert_eq!(first, ir_of(src));
    }

    #[test]
    fn test_hand_built_for_clause() {
        let context = Context::create();
        let i = || Expr::ident("i");
        let program = file(vec![func(
            "count",
            vec![],
            Some("int64"),
            vec![
                stmt(StmtKind::ShortVarDecl {
                    names: vec![Ident::new("n")],
                    values: vec![Expr::int(0)],
                }),
                stmt(StmtKind::For(ForStmt {
                    header: ForHeader::Clause {
                        init: Some(Box::new(stmt(StmtKind::ShortVarDecl {
                            names: vec![Ident::new("i")],
                            values: vec![Expr::int(0)],
                        }))),
                        cond: Some(Expr::binary(BinaryOp::Lt, i(), Expr::int(5))),
                        post: Some(Box::new(stmt(StmtKind::IncDec {
                            target: i(),
                            op: IncDecOp::Inc,
                        }))),
                    },
                    body: Block::new(vec![stmt(StmtKind::IncDec {
                        target: Expr::ident("n"),
                        op: IncDecOp::Inc,
                    })]),
                })),
                stmt(StmtKind::If(IfStmt {
                    init: None,
                    cond: Expr::binary(BinaryOp::Eq, i(), Expr::int(5)),
                    then_block: Block::new(vec![stmt(StmtKind::Return(vec![Expr::ident("n")]))]),
                    else_branch: Some(Else::Block(Block::new(vec![stmt(StmtKind::Return(
                        vec![Expr::int(-1)],
                    ))]))),
                })),
            ],
        )]);
        let module = CodeGenerator::new(&context, "test", CodegenOptions::default())
            .compile(&program)
            .unwrap();
        assert!(module.verify().is_ok());
        let engine = engine(&module);
        let n = unsafe {
            let f: JitFunction<I64Fn> = engine.get_function("count").unwrap();
            f.call()
        };
        assert_eq!(n, 5);
    }
}
