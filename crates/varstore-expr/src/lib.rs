//! Expression runtime seam and its CEL implementation.
//!
//! The reconciler only talks to the three object-safe traits below:
//! [`ExpressionRuntime`] builds an [`Environment`] from declarations, an
//! environment compiles (parses + checks references) source into a
//! [`Program`], and a program evaluates against a string-valued context.
//!
//! [`CelRuntime`] is the implementation shipped with the crate. Parsing and
//! evaluation are delegated to `cel-interpreter`; this crate owns the
//! declaration scopes, the complexity limits and the value coercions.
//!
//! # Example
//! ```
//! use std::collections::HashMap;
//! use varstore_expr::{CelRuntime, Declaration, ExpressionRuntime, Value};
//!
//! let env = CelRuntime::new()
//!     .new_environment(&[Declaration::dyn_var("base")])
//!     .unwrap();
//! let program = env.compile("base + 5").unwrap();
//! let context = HashMap::from([("base".to_string(), "10".to_string())]);
//! assert_eq!(program.evaluate(&context).unwrap(), Value::Int(15));
//! ```

mod scan;
pub mod value;

use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

pub use scan::{MAX_NESTING, MAX_OPERATORS};
pub use value::Value;

// ---------------------------------------------------------------------------
// Types and declarations
// ---------------------------------------------------------------------------

/// Value types. Variables are declared [`ValueType::Dyn`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Int,
    UInt,
    Double,
    String,
    Bool,
    Bytes,
    Null,
    List,
    Map,
    Timestamp,
    Duration,
    Opaque,
    Dyn,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ValueType::Int => "int",
            ValueType::UInt => "uint",
            ValueType::Double => "double",
            ValueType::String => "string",
            ValueType::Bool => "bool",
            ValueType::Bytes => "bytes",
            ValueType::Null => "null_type",
            ValueType::List => "list",
            ValueType::Map => "map",
            ValueType::Timestamp => "google.protobuf.Timestamp",
            ValueType::Duration => "google.protobuf.Duration",
            ValueType::Opaque => "opaque",
            ValueType::Dyn => "dyn",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub name: String,
    pub value_type: ValueType,
}

impl Declaration {
    pub fn dyn_var(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value_type: ValueType::Dyn,
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Parse or check failure. Always attributable to the expression source.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("syntax error: {0}")]
    Syntax(String),

    #[error("expression too complex at line {line}, col {col}: {reason}")]
    TooComplex {
        line: usize,
        col: usize,
        reason: String,
    },

    #[error("undeclared reference to '{0}'")]
    UndeclaredReference(String),
}

#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    /// Raised by the interpreter: overloads, arithmetic, conversions.
    #[error("{0}")]
    Execution(String),

    #[error("no value bound for variable '{0}'")]
    UnboundVariable(String),

    #[error("{0} value has no string representation")]
    NoStringForm(ValueType),
}

/// The runtime itself could not be built or extended.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("invalid declaration '{name}': {reason}")]
    InvalidDeclaration { name: String, reason: String },

    #[error("expression runtime unavailable: {0}")]
    Unavailable(String),
}

// ---------------------------------------------------------------------------
// Runtime traits
// ---------------------------------------------------------------------------

pub trait ExpressionRuntime: Send + Sync {
    /// Build the initial environment holding `declarations`.
    fn new_environment(
        &self,
        declarations: &[Declaration],
    ) -> Result<Box<dyn Environment>, RuntimeError>;
}

pub trait Environment: Send + Sync {
    /// Return a new environment with `declaration` added. `self` is unchanged.
    fn extend(&self, declaration: Declaration) -> Result<Box<dyn Environment>, RuntimeError>;

    /// Parse and type-check `source` against the declarations visible here.
    fn compile(&self, source: &str) -> Result<Box<dyn Program>, CompileError>;
}

pub trait Program: Send + Sync {
    fn evaluate(&self, context: &HashMap<String, String>) -> Result<Value, EvalError>;
}

// ---------------------------------------------------------------------------
// Built-in runtime
// ---------------------------------------------------------------------------

/// Built-in runtime. Stateless; every environment it hands out is persistent.
#[derive(Debug, Clone, Default)]
pub struct CelRuntime;

impl CelRuntime {
    pub fn new() -> Self {
        Self
    }
}

impl ExpressionRuntime for CelRuntime {
    fn new_environment(
        &self,
        declarations: &[Declaration],
    ) -> Result<Box<dyn Environment>, RuntimeError> {
        let scope = declarations
            .iter()
            .cloned()
            .fold(None, |parent, declaration| {
                Some(Arc::new(Scope { declaration, parent }))
            });
        Ok(Box::new(CelEnvironment { scope }))
    }
}

/// One link of an append-only declaration chain. Extending shares the parent.
#[derive(Debug)]
struct Scope {
    declaration: Declaration,
    parent: Option<Arc<Scope>>,
}

#[derive(Debug, Clone)]
struct CelEnvironment {
    scope: Option<Arc<Scope>>,
}

impl CelEnvironment {
    /// Innermost declaration wins, so re-declaring a name shadows it.
    fn lookup(&self, name: &str) -> Option<ValueType> {
        let mut cursor = self.scope.as_deref();
        while let Some(scope) = cursor {
            if scope.declaration.name == name {
                return Some(scope.declaration.value_type);
            }
            cursor = scope.parent.as_deref();
        }
        None
    }
}

impl Environment for CelEnvironment {
    fn extend(&self, declaration: Declaration) -> Result<Box<dyn Environment>, RuntimeError> {
        Ok(Box::new(CelEnvironment {
            scope: Some(Arc::new(Scope {
                declaration,
                parent: self.scope.clone(),
            })),
        }))
    }

    fn compile(&self, source: &str) -> Result<Box<dyn Program>, CompileError> {
        let scan = scan::scan(source)?;
        let program = cel_interpreter::Program::compile(source)
            .map_err(|e| CompileError::Syntax(e.to_string()))?;

        let mut variables: Vec<String> = Vec::new();
        for name in program.references().variables() {
            if scan.bound.iter().any(|bound| bound == name) {
                continue;
            }
            if self.lookup(name).is_none() {
                return Err(CompileError::UndeclaredReference(name.to_string()));
            }
            variables.push(name.to_string());
        }
        tracing::trace!(?variables, "Expression compiled");

        Ok(Box::new(CelProgram { program, variables }))
    }
}

/// A parsed program plus the declared variables it reads.
struct CelProgram {
    program: cel_interpreter::Program,
    variables: Vec<String>,
}

impl Program for CelProgram {
    fn evaluate(&self, context: &HashMap<String, String>) -> Result<Value, EvalError> {
        let mut activation = cel_interpreter::Context::default();
        for name in &self.variables {
            let raw = context
                .get(name)
                .ok_or_else(|| EvalError::UnboundVariable(name.clone()))?;
            activation.add_variable_from_value(name.as_str(), Value::bind(raw));
        }

        // Integer overflow inside the interpreter can panic.
        let result = panic::catch_unwind(AssertUnwindSafe(|| self.program.execute(&activation)))
            .map_err(|_| EvalError::Execution("evaluation aborted".to_string()))?;
        result
            .map(Value::from)
            .map_err(|e| EvalError::Execution(e.to_string()))
    }
}
