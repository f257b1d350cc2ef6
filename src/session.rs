use std::sync::Arc;

use crate::config::Options;
use crate::select::descriptor;
use crate::typeck::types::{StructType, Type};

/// Per-compilation state shared by every pass. Built once and passed by
/// reference; nothing in it changes after construction.
#[derive(Debug, Clone)]
pub struct Session {
    pub options: Options,
    scase: Arc<StructType>,
}

impl Session {
    pub fn new(options: Options) -> Self {
        Self { options, scase: Arc::new(descriptor::select_case_type()) }
    }

    /// The runtime's select case record type.
    pub fn select_case_type(&self) -> Type {
        Type::Struct(Arc::clone(&self.scase))
    }

    pub fn race(&self) -> bool {
        self.options.race
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(Options::default())
    }
}
