//! Structural model of a Robot Framework suite file.
//!
//! The file is kept as its original lines (terminators included) so that
//! rewriting a test name touches exactly one byte range and nothing else.
//! Sections and blocks live in flat tables and refer to each other by index.
//!
//! ```text
//! *** Test Cases ***            <- section header
//! Login Works @Tc51dd44d        <- block header, name token = "Login Works @Tc51dd44d"
//!     [Tags]    smoke           <- indented body
//!     Open Browser    ${URL}
//!
//! Logout Works    [Tags]  x     <- name token ends at the first 2+ space gap
//! ```

use crate::errors::SourceError;
use std::ops::Range;
use std::path::Path;

pub type SectionId = usize;
pub type BlockId = usize;

/// Kind of a `*** ... ***` section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind {
    /// Content before the first header; Robot ignores it.
    Implicit,
    Settings,
    Variables,
    TestCases,
    Tasks,
    Keywords,
    Comments,
}

impl SectionKind {
    fn from_header(name: &str) -> Option<Self> {
        let normalized = name.split_whitespace().collect::<Vec<_>>().join(" ");
        match normalized.to_lowercase().as_str() {
            "settings" | "setting" => Some(Self::Settings),
            "variables" | "variable" => Some(Self::Variables),
            "test cases" | "test case" => Some(Self::TestCases),
            "tasks" | "task" => Some(Self::Tasks),
            "keywords" | "keyword" => Some(Self::Keywords),
            "comments" | "comment" => Some(Self::Comments),
            _ => None,
        }
    }

    /// Whether blocks in this section are runnable tests.
    pub fn holds_tests(self) -> bool {
        matches!(self, Self::TestCases | Self::Tasks)
    }
}

/// The declared name of a test or keyword, located inside its header line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameToken {
    pub value: String,
    /// 1-based line number of the header line.
    pub line: usize,
    /// Byte range of the name inside that line.
    pub span: Range<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCaseBlock {
    pub name: NameToken,
    pub start_line: usize,
    /// Last non-blank line of the block, when a following block or section
    /// closes it. Blocks running to end-of-file leave this unset.
    pub end_line: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordBlock {
    pub name: String,
    pub start_line: usize,
    pub end_line: Option<usize>,
}

/// Settings, variables, comments: statements we never rewrite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtherBlock {
    pub start_line: usize,
    pub end_line: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    TestCase(TestCaseBlock),
    Keyword(KeywordBlock),
    Other(OtherBlock),
}

impl Block {
    pub fn start_line(&self) -> usize {
        match self {
            Self::TestCase(b) => b.start_line,
            Self::Keyword(b) => b.start_line,
            Self::Other(b) => b.start_line,
        }
    }

    fn set_end_line(&mut self, end: usize) {
        match self {
            Self::TestCase(b) => b.end_line = Some(end),
            Self::Keyword(b) => b.end_line = Some(end),
            Self::Other(b) => b.end_line = Some(end),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub kind: SectionKind,
    /// 1-based header line; `None` for the implicit leading section.
    pub header_line: Option<usize>,
    pub blocks: Vec<BlockId>,
}

/// Parsed suite file.
#[derive(Debug, Clone)]
pub struct SuiteModel {
    lines: Vec<String>,
    sections: Vec<Section>,
    blocks: Vec<Block>,
}

impl SuiteModel {
    /// Parse `text`; `path` is only used for error reporting.
    pub fn parse(path: &Path, text: &str) -> Result<Self, SourceError> {
        let lines: Vec<String> = text.split_inclusive('\n').map(str::to_string).collect();
        let mut sections = vec![Section {
            kind: SectionKind::Implicit,
            header_line: None,
            blocks: Vec::new(),
        }];
        let mut blocks: Vec<Block> = Vec::new();
        // Last non-blank line seen inside the currently open block.
        let mut open_block: Option<(BlockId, usize)> = None;

        for (idx, raw) in lines.iter().enumerate() {
            let line_no = idx + 1;
            let content = line_content(raw);
            let content = if idx == 0 {
                content.trim_start_matches('\u{feff}')
            } else {
                content
            };

            if content.starts_with('*') {
                close_block(&mut blocks, open_block.take());
                let header = header_name(content);
                let kind = SectionKind::from_header(header).ok_or_else(|| SourceError::Parse {
                    path: path.to_path_buf(),
                    line: line_no,
                    message: format!("unrecognized section header '{}'", content.trim()),
                })?;
                sections.push(Section {
                    kind,
                    header_line: Some(line_no),
                    blocks: Vec::new(),
                });
                continue;
            }

            if content.trim().is_empty() {
                continue;
            }

            if !starts_block(content) {
                if let Some((_, last)) = open_block.as_mut() {
                    *last = line_no;
                }
                continue;
            }

            close_block(&mut blocks, open_block.take());
            let section = sections.last_mut().ok_or_else(|| SourceError::Parse {
                path: path.to_path_buf(),
                line: line_no,
                message: "block outside of any section".to_string(),
            })?;
            let block = match section.kind {
                SectionKind::TestCases | SectionKind::Tasks => {
                    let span = name_span(content);
                    Block::TestCase(TestCaseBlock {
                        name: NameToken {
                            value: content[span.clone()].to_string(),
                            line: line_no,
                            span,
                        },
                        start_line: line_no,
                        end_line: None,
                    })
                }
                SectionKind::Keywords => Block::Keyword(KeywordBlock {
                    name: content[name_span(content)].to_string(),
                    start_line: line_no,
                    end_line: None,
                }),
                _ => Block::Other(OtherBlock {
                    start_line: line_no,
                    end_line: None,
                }),
            };
            let id = blocks.len();
            blocks.push(block);
            section.blocks.push(id);
            open_block = Some((id, line_no));
        }

        Ok(Self {
            lines,
            sections,
            blocks,
        })
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id]
    }

    /// Test-case blocks of every test-holding section, in file order.
    pub fn test_cases(&self) -> impl Iterator<Item = (BlockId, &TestCaseBlock)> {
        self.sections
            .iter()
            .filter(|section| section.kind.holds_tests())
            .flat_map(|section| section.blocks.iter().copied())
            .filter_map(|id| match &self.blocks[id] {
                Block::TestCase(test) => Some((id, test)),
                _ => None,
            })
    }

    /// Replace the declared name of a test-case block in place.
    ///
    /// Only the name token's byte range changes; separators, settings that
    /// share the header line, and the line terminator are preserved.
    pub fn rename_test(&mut self, id: BlockId, new_name: &str) -> bool {
        let Some(Block::TestCase(test)) = self.blocks.get_mut(id) else {
            return false;
        };
        let line = &mut self.lines[test.name.line - 1];
        line.replace_range(test.name.span.clone(), new_name);
        test.name.span = test.name.span.start..test.name.span.start + new_name.len();
        test.name.value = new_name.to_string();
        true
    }

    /// Serialize the model back to text.
    pub fn render(&self) -> String {
        self.lines.concat()
    }
}

fn close_block(blocks: &mut [Block], open: Option<(BlockId, usize)>) {
    if let Some((id, last)) = open {
        blocks[id].set_end_line(last);
    }
}

/// Line text without its terminator.
pub(crate) fn line_content(raw: &str) -> &str {
    raw.trim_end_matches(['\n', '\r'])
}

/// Section name of a header line. Data-driven headers carry column names
/// after the first separator (`*** Test Cases ***    USERNAME    PASSWORD`).
fn header_name(content: &str) -> &str {
    let inner = content.trim_start_matches('*').trim_start();
    inner[name_span(inner)].trim_end_matches('*').trim()
}

/// Zero-indented, non-comment, non-continuation lines open a new block.
pub(crate) fn starts_block(content: &str) -> bool {
    !content.starts_with([' ', '\t']) && !content.starts_with('#') && !content.starts_with("...")
}

/// The name token ends at the first separator (two or more spaces, or a tab).
fn name_span(content: &str) -> Range<usize> {
    let end = [content.find("  "), content.find('\t')]
        .into_iter()
        .flatten()
        .min()
        .unwrap_or(content.len());
    let name = content[..end].trim_end();
    0..name.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const SUITE: &str = "\
*** Settings ***
Library          String

*** Test Cases ***
First Test @Tabc
    Log    one

Second Test    [Tags]    smoke
    Log    two
# trailing comment

*** Keywords ***
Helper
    Log    helper
";

    fn parse(text: &str) -> SuiteModel {
        SuiteModel::parse(&PathBuf::from("suite.robot"), text).unwrap()
    }

    #[test]
    fn parses_sections_in_order() {
        let model = parse(SUITE);
        let kinds: Vec<_> = model.sections().iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![
                SectionKind::Implicit,
                SectionKind::Settings,
                SectionKind::TestCases,
                SectionKind::Keywords
            ]
        );
        assert_eq!(model.sections()[2].header_line, Some(4));
    }

    #[test]
    fn test_cases_carry_name_tokens_and_boundaries() {
        let model = parse(SUITE);
        let tests: Vec<_> = model.test_cases().map(|(_, t)| t.clone()).collect();
        assert_eq!(tests.len(), 2);
        assert_eq!(tests[0].name.value, "First Test @Tabc");
        assert_eq!(tests[0].start_line, 5);
        assert_eq!(tests[0].end_line, Some(6));
        assert_eq!(tests[1].name.value, "Second Test");
        // Comment lines belong to the open block.
        assert_eq!(tests[1].end_line, Some(10));
    }

    #[test]
    fn keyword_blocks_are_not_test_cases() {
        let model = parse(SUITE);
        let keyword = model.sections()[3].blocks[0];
        match model.block(keyword) {
            Block::Keyword(kw) => {
                assert_eq!(kw.name, "Helper");
                assert_eq!(kw.end_line, None);
            }
            other => panic!("expected keyword block, got {other:?}"),
        }
    }

    #[test]
    fn rename_preserves_rest_of_header_line() {
        let mut model = parse(SUITE);
        let (id, _) = model.test_cases().nth(1).unwrap();
        assert!(model.rename_test(id, "Second Test @Tnew"));
        assert!(
            model
                .render()
                .contains("Second Test @Tnew    [Tags]    smoke\n")
        );
        let renamed = model.test_cases().nth(1).unwrap().1.clone();
        assert_eq!(renamed.name.value, "Second Test @Tnew");
    }

    #[test]
    fn render_round_trips_unmodified_text() {
        let crlf = SUITE.replace('\n', "\r\n");
        assert_eq!(parse(SUITE).render(), SUITE);
        assert_eq!(parse(&crlf).render(), crlf);
    }

    #[test]
    fn unknown_section_header_is_a_parse_error() {
        let err = SuiteModel::parse(&PathBuf::from("bad.robot"), "*** Nonsense ***\nx\n")
            .unwrap_err();
        match err {
            SourceError::Parse { line, .. } => assert_eq!(line, 1),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn header_variants_are_recognized() {
        for header in ["*** Test Cases ***", "***test case***", "*Tasks", "*** Keywords"] {
            let text = format!("{header}\nName\n    Log    x\n");
            assert!(SuiteModel::parse(&PathBuf::from("s.robot"), &text).is_ok(), "{header}");
        }
    }

    #[test]
    fn header_columns_after_separator_are_ignored() {
        let text = "\
*** Settings ***    Value
Library    String

*** Test Cases ***                USERNAME         PASSWORD
Invalid User Name    invalid    secret
Invalid Password\tdemo\twrong
";
        let model = parse(text);
        let kinds: Vec<_> = model.sections().iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![
                SectionKind::Implicit,
                SectionKind::Settings,
                SectionKind::TestCases
            ]
        );
        let names: Vec<_> = model
            .test_cases()
            .map(|(_, t)| t.name.value.clone())
            .collect();
        assert_eq!(names, vec!["Invalid User Name", "Invalid Password"]);
        assert_eq!(model.render(), text);
    }

    #[test]
    fn header_columns_after_tab_are_ignored() {
        let model = parse("*** Test Cases ***\tUSERNAME\nCase\tdemo\n");
        assert_eq!(model.test_cases().count(), 1);
    }

    #[test]
    fn tasks_sections_hold_tests() {
        let model = parse("*** Tasks ***\nDo Thing\n    Log    x\n");
        assert_eq!(model.test_cases().count(), 1);
    }
}
