//! Non-fatal build diagnostics

use crate::pipeline::ModuleId;
use std::fmt;

/// Location inside a module's original source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SourcePosition {
    pub offset: usize,
    /// 1-based
    pub line: usize,
    /// 0-based, in bytes
    pub column: usize,
}

impl SourcePosition {
    pub fn locate(source: &str, offset: usize) -> Self {
        let offset = offset.min(source.len());
        let before = &source.as_bytes()[..offset];
        let line = before.iter().filter(|&&b| b == b'\n').count() + 1;
        let column = match before.iter().rposition(|&b| b == b'\n') {
            Some(newline) => offset - newline - 1,
            None => offset,
        };
        Self {
            offset,
            line,
            column,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub message: String,
    pub module: Option<ModuleId>,
    pub position: Option<SourcePosition>,
}

impl Diagnostic {
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            module: None,
            position: None,
        }
    }

    pub fn at(mut self, module: &ModuleId, source: &str, offset: usize) -> Self {
        self.module = Some(module.clone());
        self.position = Some(SourcePosition::locate(source, offset));
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.module, &self.position) {
            (Some(module), Some(pos)) => {
                write!(f, "{}:{}:{}: {}", module, pos.line, pos.column, self.message)
            }
            (Some(module), None) => write!(f, "{}: {}", module, self.message),
            _ => f.write_str(&self.message),
        }
    }
}
