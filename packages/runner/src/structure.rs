//! Code structure outline: where each compound statement starts and ends.
use serde::Serialize;
use strum::Display;

use crate::syntax_tree::{Body, Module, StatementKind};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BlockKind {
    If,
    While,
    For,
    Try,
    Function,
    Class,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct BlockOutline {
    pub kind: BlockKind,
    /// The function or class name.
    pub name: Option<String>,
    pub start_line: usize,
    pub start_column: usize,
    pub end_line: usize,
    pub depth: usize,
}

/// Every compound statement in `module`, in source order.
pub fn outline(module: &Module) -> Vec<BlockOutline> {
    let mut blocks = Vec::new();
    visit(module.body(), 0, &mut blocks);
    blocks
}

fn visit(body: &Body, depth: usize, blocks: &mut Vec<BlockOutline>) {
    for statement in body.iter() {
        let kind = statement.kind();
        let (block_kind, name) = match kind {
            StatementKind::If { .. } => (BlockKind::If, None),
            StatementKind::While { .. } => (BlockKind::While, None),
            StatementKind::For { .. } => (BlockKind::For, None),
            StatementKind::Try { .. } => (BlockKind::Try, None),
            StatementKind::FunctionDef(function) => {
                (BlockKind::Function, Some(function.name().to_owned()))
            }
            StatementKind::ClassDef(class) => (BlockKind::Class, Some(class.name().to_owned())),
            _ => continue,
        };

        blocks.push(BlockOutline {
            kind: block_kind,
            name,
            start_line: statement.span().line(),
            start_column: statement.span().column(),
            end_line: statement.last_line(),
            depth,
        });

        for nested in kind.bodies() {
            visit(nested, depth + 1, blocks);
        }
    }
}
