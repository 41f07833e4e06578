//! Instruction snippets spliced into the entry activity.

pub const LOAD_LIBRARY_METHOD: &str = "Ljava/lang/System;->loadLibrary(Ljava/lang/String;)V";

/// Registers the partial snippet uses on top of the method's own locals.
pub const PARTIAL_REGISTERS: u32 = 1;

fn const_string(library: &str) -> String {
    format!("    const-string v0, \"{library}\"")
}

fn invoke_load_library() -> String {
    format!("    invoke-static {{v0}}, {LOAD_LIBRARY_METHOD}")
}

/// Load call placed inside an existing constructor, ahead of its first instruction.
pub fn load_library_call(library: &str) -> Vec<String> {
    vec![
        String::new(),
        const_string(library),
        String::new(),
        invoke_load_library(),
    ]
}

/// Complete static initializer used when the class has no constructor to extend.
pub fn full_constructor(library: &str) -> Vec<String> {
    vec![
        ".method static constructor <clinit>()V".to_owned(),
        "    .locals 1".to_owned(),
        String::new(),
        "    .prologue".to_owned(),
        const_string(library),
        String::new(),
        invoke_load_library(),
        String::new(),
        "    return-void".to_owned(),
        ".end method".to_owned(),
        String::new(),
    ]
}

/// Whether `line` is the `const-string` half of a load call for `library`.
pub fn is_library_constant(line: &str, library: &str) -> bool {
    let trimmed = line.trim();
    trimmed.starts_with("const-string") && trimmed.ends_with(&format!(", \"{library}\""))
}
