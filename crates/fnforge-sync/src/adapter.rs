//! Format adapter between the in-repo and runtime code conventions
//!
//! Code stored in the repository carries the platform's runtime import on
//! its first line; code stored locally (the portable form) does not. Pull
//! strips the line, push re-inserts it. Both directions are idempotent.

pub const RUNTIME_IMPORT: &str = "import { app } from \"fnforge:runtime\";";

/// Remote → local: drop the runtime import line wherever it appears, then
/// trim the blank line it leaves behind at the top of the file.
pub fn strip_runtime_import(code: &str) -> String {
    let mut lines: Vec<&str> = code
        .lines()
        .filter(|line| line.trim() != RUNTIME_IMPORT)
        .collect();
    while lines.first().is_some_and(|line| line.trim().is_empty()) {
        lines.remove(0);
    }
    let mut out = lines.join("\n");
    if code.ends_with('\n') && !out.is_empty() {
        out.push('\n');
    }
    out
}

/// Local → remote: prepend the runtime import unless it is already there.
pub fn insert_runtime_import(code: &str) -> String {
    if code.lines().any(|line| line.trim() == RUNTIME_IMPORT) {
        return code.to_string();
    }
    format!("{}\n{}", RUNTIME_IMPORT, code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_removes_import_line() {
        let code = format!("{}\nexport default () => 1;\n", RUNTIME_IMPORT);
        assert_eq!(strip_runtime_import(&code), "export default () => 1;\n");
    }

    #[test]
    fn strip_is_idempotent() {
        let code = "export default () => 1;\n";
        assert_eq!(strip_runtime_import(code), code);
        assert_eq!(
            strip_runtime_import(&strip_runtime_import(code)),
            code
        );
    }

    #[test]
    fn insert_is_idempotent() {
        let code = "export default () => 1;";
        let once = insert_runtime_import(code);
        assert_eq!(insert_runtime_import(&once), once);
        assert!(once.starts_with(RUNTIME_IMPORT));
    }

    #[test]
    fn round_trip_restores_local_form() {
        let code = "export default () => 1;\n";
        assert_eq!(strip_runtime_import(&insert_runtime_import(code)), code);
    }
}
