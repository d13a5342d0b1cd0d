//! Logical lines and indentation blocks.
//!
//! Source text is split into logical lines (physical lines joined while
//! brackets are open, with comments and blank lines removed), then nested
//! into [`Block`]s by indentation. Misindented lines are handled according
//! to an [`IndentationPolicy`].
use serde::Serialize;
use strum::Display;

use crate::syntax_tree::ParseError;

const TAB_WIDTH: usize = 8;

/// What to do with a line whose indentation doesn't match any open block.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum IndentationPolicy {
    /// Keep the line in the innermost open block whose header is indented
    /// less than it, and record a [`Diagnostic`].
    #[default]
    Lenient,
    /// Reject the source with [`ParseError::Indentation`].
    Strict,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Display)]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosticKind {
    #[strum(to_string = "unexpected indent")]
    UnexpectedIndent,
    #[strum(to_string = "unindent does not match any outer indentation level")]
    InconsistentDedent,
}

/// A misindented line, kept verbatim.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Diagnostic {
    pub line: usize,
    pub kind: DiagnosticKind,
    pub text: String,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LogicalLine {
    /// 1-based number of the first physical line.
    pub number: usize,
    /// Indentation width in columns, with tabs expanded.
    pub indent: usize,
    /// Code with comments removed and continuation lines joined.
    pub code: String,
    /// The first physical line, untouched.
    pub raw: String,
}

impl LogicalLine {
    /// Does this line open an indented block?
    pub fn is_header(&self) -> bool {
        self.code.ends_with(':')
    }
}

#[derive(Debug, Eq, PartialEq)]
pub struct Block {
    pub line: LogicalLine,
    pub children: Vec<Block>,
}

#[derive(Debug)]
pub struct Layout {
    pub blocks: Vec<Block>,
    pub diagnostics: Vec<Diagnostic>,
}

pub fn logical_lines(source: &str) -> Vec<LogicalLine> {
    let mut lines = Vec::new();
    let mut pending: Option<LogicalLine> = None;
    let mut depth: isize = 0;

    for (index, raw) in source.lines().enumerate() {
        let (code, bracket_delta) = scan_code(raw);
        let code = code.trim();

        match pending.as_mut() {
            Some(open) => {
                if !code.is_empty() {
                    open.code.push(' ');
                    open.code.push_str(code);
                }
            }
            None if code.is_empty() => continue,
            None => {
                pending = Some(LogicalLine {
                    number: index + 1,
                    indent: indent_width(raw),
                    code: code.to_owned(),
                    raw: raw.to_owned(),
                })
            }
        }

        depth = (depth + bracket_delta).max(0);

        if depth == 0 {
            lines.extend(pending.take());
        }
    }

    // An unclosed bracket is left for the statement parser to report.
    lines.extend(pending);
    lines
}

pub fn layout(source: &str, policy: IndentationPolicy) -> Result<Layout, ParseError> {
    let mut stack = vec![Frame::new(0)];
    let mut diagnostics = Vec::new();
    let mut open_header: Option<usize> = None;

    for line in logical_lines(source) {
        let current = top_indent(&stack);

        if let Some(header_line) = open_header.take() {
            if line.indent <= current {
                return Err(ParseError::ExpectedIndent { line: header_line });
            }

            stack.push(Frame::new(line.indent));
        } else if line.indent > current {
            report(policy, DiagnosticKind::UnexpectedIndent, &line, &mut diagnostics)?;
        } else {
            while top_indent(&stack) > line.indent {
                if stack[stack.len() - 2].indent < line.indent {
                    report(
                        policy,
                        DiagnosticKind::InconsistentDedent,
                        &line,
                        &mut diagnostics,
                    )?;
                    break;
                }

                close_frame(&mut stack);
            }
        }

        if line.is_header() {
            open_header = Some(line.number);
        }

        if let Some(frame) = stack.last_mut() {
            frame.blocks.push(Block {
                line,
                children: Vec::new(),
            });
        }
    }

    if let Some(header_line) = open_header {
        return Err(ParseError::ExpectedIndent { line: header_line });
    }

    while stack.len() > 1 {
        close_frame(&mut stack);
    }

    let blocks = stack.pop().map(|frame| frame.blocks).unwrap_or_default();

    Ok(Layout {
        blocks,
        diagnostics,
    })
}

/// Remove any indentation common to all non-blank lines.
pub fn remove_common_indent(text: &str) -> String {
    let common = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(leading_spaces)
        .min()
        .unwrap_or(0);

    if common == 0 {
        return text.to_owned();
    }

    let mut dedented = text
        .lines()
        .map(|line| line.get(common..).unwrap_or(""))
        .collect::<Vec<_>>()
        .join("\n");

    if text.ends_with('\n') {
        dedented.push('\n');
    }

    dedented
}

struct Frame {
    indent: usize,
    blocks: Vec<Block>,
}

impl Frame {
    fn new(indent: usize) -> Self {
        Self {
            indent,
            blocks: Vec::new(),
        }
    }
}

fn top_indent(stack: &[Frame]) -> usize {
    stack.last().map_or(0, |frame| frame.indent)
}

/// Pop the innermost frame and hand its blocks to the header that opened it.
fn close_frame(stack: &mut Vec<Frame>) {
    if let Some(frame) = stack.pop() {
        if let Some(header) = stack.last_mut().and_then(|parent| parent.blocks.last_mut()) {
            header.children = frame.blocks;
        }
    }
}

fn report(
    policy: IndentationPolicy,
    kind: DiagnosticKind,
    line: &LogicalLine,
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<(), ParseError> {
    match policy {
        IndentationPolicy::Strict => Err(ParseError::Indentation {
            line: line.number,
            kind,
            text: line.raw.clone(),
        }),
        IndentationPolicy::Lenient => {
            tracing::warn!(line = line.number, text = %line.raw, "{kind}");
            diagnostics.push(Diagnostic {
                line: line.number,
                kind,
                text: line.raw.clone(),
            });
            Ok(())
        }
    }
}

/// Split off any comment and count how many brackets the line leaves open.
fn scan_code(line: &str) -> (&str, isize) {
    let mut quote = None;
    let mut escaped = false;
    let mut delta = 0;

    for (index, c) in line.char_indices() {
        match quote {
            Some(open) => {
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == open {
                    quote = None;
                }
            }
            None => match c {
                '#' => return (&line[..index], delta),
                '"' | '\'' => quote = Some(c),
                '(' | '[' | '{' => delta += 1,
                ')' | ']' | '}' => delta -= 1,
                _ => (),
            },
        }
    }

    (line, delta)
}

fn indent_width(line: &str) -> usize {
    let mut width = 0;

    for c in line.chars() {
        match c {
            ' ' => width += 1,
            '\t' => width = (width / TAB_WIDTH + 1) * TAB_WIDTH,
            _ => break,
        }
    }

    width
}

fn leading_spaces(line: &str) -> usize {
    line.chars().take_while(|c| *c == ' ').count()
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use serde_json::json;

    use super::{
        layout, logical_lines, remove_common_indent, Block, DiagnosticKind, IndentationPolicy,
    };
    use crate::syntax_tree::ParseError;

    #[test]
    fn comments_and_blank_lines() {
        let lines = logical_lines(indoc! {"
            # Leading comment

            x = 1  # trailing
            s = \"# not a comment\"
        "});

        let code: Vec<_> = lines.iter().map(|line| line.code.as_str()).collect();
        assert_eq!(code, ["x = 1", "s = \"# not a comment\""]);
        assert_eq!(lines[0].number, 3);
    }

    #[test]
    fn bracket_continuation() {
        let lines = logical_lines(indoc! {"
            print(
                1,
                2
            )
            y = 2
        "});

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].code, "print( 1, 2 )");
        assert_eq!(lines[0].number, 1);
        assert_eq!(lines[1].number, 5);
    }

    #[test]
    fn tabs_expand_to_next_stop() {
        let lines = logical_lines("if x:\n\tpass\n  \tpass\n");

        assert_eq!(lines[1].indent, 8);
        assert_eq!(lines[2].indent, 8);
    }

    #[test]
    fn nested_blocks() {
        let layout = layout(
            indoc! {"
                if a:
                    if b:
                        x
                    y
                z
            "},
            IndentationPolicy::Strict,
        )
        .unwrap();

        assert_eq!(shape(&layout.blocks), ["if a:[if b:[x], y]", "z"]);
        assert!(layout.diagnostics.is_empty());
    }

    #[test]
    fn lenient_inconsistent_dedent() {
        let source = indoc! {"
            if a:
                if b:
                    x
                  y
            z
        "};
        let layout = layout(source, IndentationPolicy::Lenient).unwrap();

        assert_eq!(shape(&layout.blocks), ["if a:[if b:[x, y]]", "z"]);
        assert_eq!(layout.diagnostics.len(), 1);
        assert_eq!(layout.diagnostics[0].line, 4);
        assert_eq!(
            layout.diagnostics[0].kind,
            DiagnosticKind::InconsistentDedent
        );
        assert_eq!(layout.diagnostics[0].text, "      y");
    }

    #[test]
    fn strict_inconsistent_dedent() {
        let source = indoc! {"
            if a:
                if b:
                    x
                  y
        "};

        match layout(source, IndentationPolicy::Strict) {
            Err(ParseError::Indentation { line, kind, text }) => {
                assert_eq!(line, 4);
                assert_eq!(kind, DiagnosticKind::InconsistentDedent);
                assert_eq!(text, "      y");
            }
            other => panic!("Unexpected result {other:?}"),
        }
    }

    #[test]
    fn lenient_unexpected_indent() {
        let layout = layout("x\n    y\nz\n", IndentationPolicy::Lenient).unwrap();

        assert_eq!(shape(&layout.blocks), ["x", "y", "z"]);
        assert_eq!(
            layout.diagnostics[0].kind,
            DiagnosticKind::UnexpectedIndent
        );
    }

    #[test]
    fn diagnostic_json() {
        let layout = layout("x\n    y\nz\n", IndentationPolicy::Lenient).unwrap();

        assert_eq!(
            serde_json::to_value(&layout.diagnostics).unwrap(),
            json!([{ "line": 2, "kind": "unexpected-indent", "text": "    y" }])
        );
        assert_eq!(
            serde_json::to_value(IndentationPolicy::Strict).unwrap(),
            json!("strict")
        );
    }

    #[test]
    fn missing_block() {
        let result = layout("if a:\nx\n", IndentationPolicy::Lenient);

        assert!(matches!(result, Err(ParseError::ExpectedIndent { line: 1 })));
    }

    #[test]
    fn missing_block_at_end() {
        let result = layout("x\nwhile True:\n", IndentationPolicy::Lenient);

        assert!(matches!(result, Err(ParseError::ExpectedIndent { line: 2 })));
    }

    #[test]
    fn common_indent() {
        assert_eq!(
            remove_common_indent("    if a:\n        b\n\n    c\n"),
            "if a:\n    b\n\nc\n"
        );
        assert_eq!(remove_common_indent("a\n  b"), "a\n  b");
    }

    fn shape(blocks: &[Block]) -> Vec<String> {
        blocks
            .iter()
            .map(|block| {
                if block.children.is_empty() {
                    block.line.code.clone()
                } else {
                    format!("{}[{}]", block.line.code, shape(&block.children).join(", "))
                }
            })
            .collect()
    }
}
