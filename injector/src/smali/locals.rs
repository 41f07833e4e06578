use tracing::{debug, warn};

use super::{
    buffer::LineBuffer,
    error::InjectionError,
    scanner::{classify, LineKind, LOCALS_DIRECTIVE},
};

/// What happened to the constructor's `.locals` declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalsUpdate {
    Updated { line: usize, from: u32, to: u32 },
    /// No `.locals` in the method, nothing was changed
    Missing,
    /// A `.locals` line exists but its count is not a decimal number, or is too large
    /// to grow
    Unparsable { line: usize, value: String },
}

/// Index of the first `.end method` at or after `method_start`.
pub fn find_method_end(lines: &LineBuffer, method_start: usize) -> Result<usize, InjectionError> {
    lines
        .iter_from(method_start)
        .find(|(_, line)| classify(line) == LineKind::MethodEnd)
        .map(|(idx, _)| idx)
        .ok_or(InjectionError::NoMethodEnd { method_start })
}

/// Bump the `.locals` count of the method starting at `method_start` by `added`.
///
/// A trailing return instruction right above `.end method` is left out of the search.
/// Missing or unparsable declarations are logged and reported, not treated as fatal.
pub fn update_locals(
    lines: &mut LineBuffer,
    method_start: usize,
    added: u32,
) -> Result<LocalsUpdate, InjectionError> {
    let method_end = find_method_end(lines, method_start)?;

    let mut search_end = method_end;
    if search_end > method_start + 1
        && lines
            .get(search_end - 1)
            .is_some_and(|line| classify(line) == LineKind::Return)
    {
        search_end -= 1;
    }

    let Some((line_idx, line)) = lines
        .iter_from(method_start)
        .take(search_end - method_start)
        .find(|(_, line)| classify(line) == LineKind::Locals)
    else {
        warn!("Couldn't determine any .locals for the target constructor");
        return Ok(LocalsUpdate::Missing);
    };

    let indent_len = line.len() - line.trim_start().len();
    let indent = line[..indent_len].to_owned();
    let value = line
        .trim()
        .trim_start_matches(LOCALS_DIRECTIVE)
        .trim()
        .to_owned();

    let from = match value.parse::<u32>() {
        Ok(from) => from,
        Err(err) => {
            warn!(
                "Couldn't parse .locals value {:?} at line {}: {}",
                value,
                line_idx + 1,
                err
            );
            return Ok(LocalsUpdate::Unparsable {
                line: line_idx,
                value,
            });
        }
    };

    let Some(to) = from.checked_add(added) else {
        warn!(
            ".locals {} at line {} can't grow by {}",
            from,
            line_idx + 1,
            added
        );
        return Ok(LocalsUpdate::Unparsable {
            line: line_idx,
            value,
        });
    };
    lines.replace(line_idx, format!("{indent}{LOCALS_DIRECTIVE} {to}"));
    debug!(".locals {} -> {} at line {}", from, to, line_idx + 1);

    Ok(LocalsUpdate::Updated {
        line: line_idx,
        from,
        to,
    })
}
