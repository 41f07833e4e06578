use tracing::debug;

use super::{buffer::LineBuffer, error::InjectionError};

// Section comment baksmali/APKEditor emit before constructors and static methods
pub const DIRECT_METHODS_MARKER: &str = "# direct methods";

// Matches both `<init>` and `<clinit>`
pub const CONSTRUCTOR_MARKER: &str = "init>";

pub const METHOD_END: &str = ".end method";
pub const LOCALS_DIRECTIVE: &str = ".locals";

const ANNOTATION_OPEN: &str = ".annotation ";
const ANNOTATION_CLOSE: &str = ".end annotation";
const RETURN_PREFIX: &str = "return";

/// Structural role of a single smali line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Blank,
    Locals,
    AnnotationOpen,
    AnnotationClose,
    /// Any line between an annotation's open and close markers
    Annotated,
    MethodEnd,
    Return,
    Ordinary,
}

impl LineKind {
    /// Lines an injected instruction may be placed after without changing meaning.
    pub fn is_skippable(self) -> bool {
        matches!(
            self,
            LineKind::Blank
                | LineKind::Locals
                | LineKind::AnnotationOpen
                | LineKind::AnnotationClose
                | LineKind::Annotated
        )
    }
}

/// Classify a line outside of any annotation region.
pub fn classify(line: &str) -> LineKind {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        LineKind::Blank
    } else if is_locals(trimmed) {
        LineKind::Locals
    } else if trimmed.starts_with(ANNOTATION_OPEN) {
        LineKind::AnnotationOpen
    } else if trimmed.starts_with(ANNOTATION_CLOSE) {
        LineKind::AnnotationClose
    } else if trimmed.contains(METHOD_END) {
        LineKind::MethodEnd
    } else if trimmed.starts_with(RETURN_PREFIX) {
        LineKind::Return
    } else {
        LineKind::Ordinary
    }
}

fn is_locals(trimmed: &str) -> bool {
    trimmed
        .strip_prefix(LOCALS_DIRECTIVE)
        .is_some_and(|rest| rest.starts_with(char::is_whitespace))
}

/// Parser state threaded through a top-to-bottom scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnnotationState {
    #[default]
    Outside,
    InsideAnnotation,
}

impl AnnotationState {
    /// Classify `line` in the current state and return the state for the next line.
    ///
    /// Inside an annotation only the close marker is recognized, everything else is
    /// reported as [`LineKind::Annotated`].
    pub fn scan(self, line: &str) -> (AnnotationState, LineKind) {
        match self {
            AnnotationState::Outside => {
                let kind = classify(line);
                let next = if kind == LineKind::AnnotationOpen {
                    AnnotationState::InsideAnnotation
                } else {
                    AnnotationState::Outside
                };
                (next, kind)
            }
            AnnotationState::InsideAnnotation => {
                if line.trim().starts_with(ANNOTATION_CLOSE) {
                    (AnnotationState::Outside, LineKind::AnnotationClose)
                } else {
                    (AnnotationState::InsideAnnotation, LineKind::Annotated)
                }
            }
        }
    }
}

/// Index of the first line carrying the direct-methods section comment.
pub fn find_anchor(lines: &LineBuffer) -> Result<usize, InjectionError> {
    let anchor = lines
        .iter_from(0)
        .find(|(_, line)| line.contains(DIRECT_METHODS_MARKER))
        .map(|(idx, _)| idx)
        .ok_or(InjectionError::NoAnchor)?;
    debug!("Direct methods section starts at line {}", anchor + 1);
    Ok(anchor)
}
