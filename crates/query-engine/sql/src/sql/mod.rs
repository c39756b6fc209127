//! Definition of a SQL AST, and the means to render it as dialect-specific SQL text.

pub mod ast;
pub mod convert;
pub mod execution_plan;
pub mod helpers;
pub mod string;
