//! Builds the internal tool registry shared by agent and coder mode
//! (Glossary "Coder mode": `tree`, `search`, `read`, `write`, `patch`,
//! `exec`, `rollback`, `clean`).

use crate::agent::tools::{
    CleanTool, ExecTool, InternalTool, PatchTool, ReadTool, RollbackTool, SearchTool, SharedExecutor,
    TreeTool, WriteTool,
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

pub fn build_registry(root: &Path, executor: SharedExecutor) -> HashMap<&'static str, Arc<dyn InternalTool>> {
    let mut tools: HashMap<&'static str, Arc<dyn InternalTool>> = HashMap::new();
    tools.insert("tree", Arc::new(TreeTool { root: root.to_path_buf(), max_depth: 4 }));
    tools.insert("search", Arc::new(SearchTool { root: root.to_path_buf() }));
    tools.insert("read", Arc::new(ReadTool { root: root.to_path_buf() }));
    tools.insert("write", Arc::new(WriteTool { root: root.to_path_buf() }));
    tools.insert("patch", Arc::new(PatchTool { root: root.to_path_buf() }));
    tools.insert("exec", Arc::new(ExecTool { executor: executor.clone() }));
    tools.insert("rollback", Arc::new(RollbackTool { executor: executor.clone() }));
    tools.insert("clean", Arc::new(CleanTool { executor }));
    tools
}
