use inkwell::builder::BuilderError;
use nanogo_frontend::ast::Span;
use thiserror::Error;

/// What went wrong while lowering. Every kind is fatal to the whole pass.
#[derive(Debug, Error)]
pub enum CodegenErrorKind {
    #[error("unbound identifier `{0}`")]
    UnboundIdentifier(String),
    #[error("unsupported operator `{0}`")]
    UnsupportedOperator(String),
    #[error("unsupported {0} literal")]
    UnsupportedLiteralKind(String),
    #[error("unsupported statement form: {0}")]
    UnsupportedStatementForm(String),
    #[error("unknown type `{0}`")]
    UnknownType(String),
    #[error("unknown construct: {0}")]
    UnknownConstruct(String),
    #[error("type mismatch: {0}")]
    TypeMismatch(String),
    #[error("`{callee}` expects {expected} argument(s), got {found}")]
    ArityMismatch {
        callee: String,
        expected: usize,
        found: usize,
    },
    #[error("function `{0}` is already defined")]
    DuplicateFunction(String),
    #[error("block `{0}` has no terminator")]
    UnterminatedBlock(String),
    #[error("LLVM builder error: {0}")]
    Builder(#[from] BuilderError),
}

impl CodegenErrorKind {
    /// Attach the location of the construct that triggered the error.
    pub fn at(self, span: Span) -> CodegenError {
        CodegenError { kind: self, span }
    }
}

/// A lowering failure with the location of the offending construct.
#[derive(Debug, Error)]
#[error("{span}: {kind}")]
pub struct CodegenError {
    pub kind: CodegenErrorKind,
    pub span: Span,
}

impl From<BuilderError> for CodegenError {
    fn from(err: BuilderError) -> Self {
        CodegenErrorKind::Builder(err).at(Span::DUMMY)
    }
}

pub type Result<T> = std::result::Result<T, CodegenError>;
