use std::ops::Range;

use tracing::debug;

use super::{
    buffer::LineBuffer,
    error::InjectionError,
    scanner::{classify, AnnotationState, LineKind, CONSTRUCTOR_MARKER},
    templates,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectionMode {
    /// A constructor follows the anchor, the load call goes into its body
    Partial,
    /// No constructor follows the anchor, a whole static initializer is synthesized
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InjectionPoint {
    pub mode: InjectionMode,
    /// Line right below the anchor: the constructor's `.method` line in partial mode
    pub method_start: usize,
    pub insert_at: usize,
}

/// Decide how and where the load call goes, given the direct-methods anchor.
pub fn resolve(lines: &LineBuffer, anchor: usize) -> Result<InjectionPoint, InjectionError> {
    let method_start = anchor + 1;

    match lines.get(method_start) {
        Some(line) if line.contains(CONSTRUCTOR_MARKER) => {
            debug!("Constructor is present in entry activity");
            Ok(InjectionPoint {
                mode: InjectionMode::Partial,
                method_start,
                insert_at: find_injection_point(lines, method_start)?,
            })
        }
        _ => {
            debug!("Constructor is NOT present in entry activity");
            Ok(InjectionPoint {
                mode: InjectionMode::Full,
                method_start,
                insert_at: method_start,
            })
        }
    }
}

/// Find where the first real instruction of the method at `method_start` begins.
///
/// Blank lines, `.locals` and whole annotation regions are stepped over. The insertion
/// lands on the blank padding line directly above the first instruction if there is
/// one, otherwise right at the instruction.
pub fn find_injection_point(
    lines: &LineBuffer,
    method_start: usize,
) -> Result<usize, InjectionError> {
    let mut state = AnnotationState::default();

    for (idx, line) in lines.iter_from(method_start + 1) {
        let (next, kind) = state.scan(line);
        state = next;
        if kind.is_skippable() {
            continue;
        }

        let above = idx - 1;
        let insert_at = match lines.get(above) {
            Some(prev) if above > method_start && classify(prev) == LineKind::Blank => above,
            _ => idx,
        };
        debug!(
            "First instruction at line {}, injecting at line {}",
            idx + 1,
            insert_at + 1
        );
        return Ok(insert_at);
    }

    Err(InjectionError::NoInjectionPoint { method_start })
}

/// Splice the snippet for `point.mode` into `lines`, returning the inserted range.
pub fn splice_load_library(
    lines: &mut LineBuffer,
    point: &InjectionPoint,
    library: &str,
) -> Range<usize> {
    let snippet = match point.mode {
        InjectionMode::Partial => templates::load_library_call(library),
        InjectionMode::Full => templates::full_constructor(library),
    };
    lines.splice(point.insert_at, snippet)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(lines: &[&str]) -> LineBuffer {
        lines.iter().copied().collect()
    }

    #[test]
    fn constructor_after_anchor_is_partial() {
        let lines = buffer(&[
            "# direct methods",
            ".method public constructor <init>()V",
            "    .locals 0",
            "",
            "    invoke-direct {p0}, Landroid/app/Activity;-><init>()V",
            "",
            "    return-void",
            ".end method",
        ]);

        let point = resolve(&lines, 0).unwrap();
        assert_eq!(point.mode, InjectionMode::Partial);
        assert_eq!(point.method_start, 1);
        assert_eq!(point.insert_at, 3);
    }

    #[test]
    fn static_initializer_counts_as_constructor() {
        let lines = buffer(&[
            "# direct methods",
            ".method static constructor <clinit>()V",
            "    .locals 1",
            "    sget-object v0, La/b/C;->x:La/b/C;",
            ".end method",
        ]);

        let point = resolve(&lines, 0).unwrap();
        assert_eq!(point.mode, InjectionMode::Partial);
        assert_eq!(point.insert_at, 3);
    }

    #[test]
    fn other_method_after_anchor_is_full() {
        let lines = buffer(&[
            "# direct methods",
            ".method private static helper()V",
            "    .locals 0",
            "    return-void",
            ".end method",
        ]);

        let point = resolve(&lines, 0).unwrap();
        assert_eq!(point.mode, InjectionMode::Full);
        assert_eq!(point.insert_at, 1);
    }

    #[test]
    fn anchor_on_last_line_is_full() {
        let lines = buffer(&[".class public La/b/C;", "# direct methods"]);
        let point = resolve(&lines, 1).unwrap();
        assert_eq!(point.mode, InjectionMode::Full);
        assert_eq!(point.insert_at, 2);
    }

    #[test]
    fn annotation_block_is_skipped_whole() {
        let lines = buffer(&[
            "# direct methods",
            ".method public constructor <init>()V",
            "    .locals 1",
            "    .annotation build Landroid/annotation/SuppressLint;",
            "        value = {",
            "            \"NewApi\"",
            "        }",
            "    .end annotation",
            "    invoke-direct {p0}, Landroid/app/Activity;-><init>()V",
            "    return-void",
            ".end method",
        ]);

        let point = resolve(&lines, 0).unwrap();
        assert_eq!(point.insert_at, 8);
    }

    #[test]
    fn blank_after_annotation_is_used_as_padding() {
        let lines = buffer(&[
            "# direct methods",
            ".method public constructor <init>()V",
            "    .annotation system Ldalvik/annotation/Throws;",
            "        value = {",
            "            Ljava/io/IOException;",
            "        }",
            "    .end annotation",
            "",
            "    .locals 0",
            "",
            "    invoke-direct {p0}, Ljava/lang/Object;-><init>()V",
            ".end method",
        ]);

        assert_eq!(find_injection_point(&lines, 1).unwrap(), 9);
    }

    #[test]
    fn empty_body_injects_before_method_end() {
        let lines = buffer(&[
            "# direct methods",
            ".method public constructor <init>()V",
            "    .locals 0",
            ".end method",
        ]);

        assert_eq!(find_injection_point(&lines, 1).unwrap(), 3);
    }

    #[test]
    fn unterminated_constructor_has_no_injection_point() {
        let lines = buffer(&[
            "# direct methods",
            ".method public constructor <init>()V",
            "    .locals 0",
            "",
            "    .annotation runtime La/b/Ann;",
            "    .end annotation",
            "",
        ]);

        assert!(matches!(
            resolve(&lines, 0),
            Err(InjectionError::NoInjectionPoint { method_start: 1 })
        ));
    }

    #[test]
    fn unclosed_annotation_has_no_injection_point() {
        let lines = buffer(&[
            "# direct methods",
            ".method public constructor <init>()V",
            "    .annotation runtime La/b/Ann;",
            "    invoke-direct {p0}, Ljava/lang/Object;-><init>()V",
            ".end method",
        ]);

        assert!(find_injection_point(&lines, 1).is_err());
    }

    #[test]
    fn splice_partial_inserts_four_lines() {
        let mut lines = buffer(&[
            "# direct methods",
            ".method public constructor <init>()V",
            "    .locals 0",
            "",
            "    return-void",
            ".end method",
        ]);
        let point = resolve(&lines, 0).unwrap();
        let range = splice_load_library(&mut lines, &point, "frida");

        assert_eq!(range, 3..7);
        assert_eq!(lines.get(4), Some("    const-string v0, \"frida\""));
        assert_eq!(lines.get(7), Some(""));
        assert_eq!(lines.get(8), Some("    return-void"));
    }
}
