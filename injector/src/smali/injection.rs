use std::ops::Range;

use tracing::info;

use super::{
    buffer::LineBuffer,
    error::InjectionError,
    locals::{update_locals, LocalsUpdate},
    resolver::{resolve, splice_load_library, InjectionMode},
    scanner::{classify, find_anchor, LineKind},
    templates::{self, LOAD_LIBRARY_METHOD, PARTIAL_REGISTERS},
};

/// Summary of a successful injection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectionReport {
    pub library: String,
    pub mode: InjectionMode,
    /// Lines occupied by the injected snippet in the patched buffer
    pub inserted: Range<usize>,
    /// `None` in full mode, where the synthesized method declares its own locals
    pub locals: Option<LocalsUpdate>,
}

/// Strip the `lib` prefix and `.so` suffix: `libfrida.so` becomes `frida`.
pub fn bare_library_name(file_name: &str) -> &str {
    let name = file_name.strip_prefix("lib").unwrap_or(file_name);
    name.strip_suffix(".so").unwrap_or(name)
}

/// Whether `lines` already loads `library` through `System.loadLibrary`.
pub fn is_already_injected(lines: &LineBuffer, library: &str) -> bool {
    lines.iter_from(0).any(|(idx, line)| {
        templates::is_library_constant(line, library)
            && lines
                .iter_from(idx + 1)
                .find(|(_, next)| classify(next) != LineKind::Blank)
                .is_some_and(|(_, next)| next.contains(LOAD_LIBRARY_METHOD))
    })
}

/// Patch `lines` so the class loads `library_name` when it is initialized.
///
/// On error the buffer is dropped, the caller still holds the untouched original.
pub fn perform_injection(
    mut lines: LineBuffer,
    library_name: &str,
) -> Result<(LineBuffer, InjectionReport), InjectionError> {
    let library = bare_library_name(library_name);
    info!("Injecting loadLibrary(\"{}\")", library);

    if is_already_injected(&lines, library) {
        return Err(InjectionError::AlreadyInjected {
            library: library.to_owned(),
        });
    }

    let anchor = find_anchor(&lines)?;
    let point = resolve(&lines, anchor)?;
    let inserted = splice_load_library(&mut lines, &point, library);

    let locals = match point.mode {
        InjectionMode::Partial => Some(update_locals(
            &mut lines,
            point.method_start,
            PARTIAL_REGISTERS,
        )?),
        InjectionMode::Full => None,
    };

    Ok((
        lines,
        InjectionReport {
            library: library.to_owned(),
            mode: point.mode,
            inserted,
            locals,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_only_prefix_and_suffix() {
        assert_eq!(bare_library_name("libfrida.so"), "frida");
        assert_eq!(bare_library_name("libgadgetlib.so"), "gadgetlib");
        assert_eq!(bare_library_name("frida"), "frida");
        assert_eq!(bare_library_name("libso.so"), "so");
    }

    #[test]
    fn detects_previous_injection_with_blank_between() {
        let lines: LineBuffer = [
            "    const-string v0, \"frida\"",
            "",
            "    invoke-static {v0}, Ljava/lang/System;->loadLibrary(Ljava/lang/String;)V",
        ]
        .into_iter()
        .collect();

        assert!(is_already_injected(&lines, "frida"));
        assert!(!is_already_injected(&lines, "gadget"));
    }

    #[test]
    fn constant_without_load_call_is_not_an_injection() {
        let lines: LineBuffer = [
            "    const-string v0, \"frida\"",
            "    invoke-static {v0}, Landroid/util/Log;->d(Ljava/lang/String;)I",
        ]
        .into_iter()
        .collect();

        assert!(!is_already_injected(&lines, "frida"));
    }
}
