//! Extension-based language tags.

use codepilot_core::ingest::LanguageDetector;

/// Tag used when the extension is not recognised.
pub const UNKNOWN: &str = "unknown";

/// Map a path's extension to a language tag.
pub fn detect_lang(path: &str) -> &'static str {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    let ext = match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => ext.to_lowercase(),
        _ => return UNKNOWN,
    };
    match ext.as_str() {
        "py" | "pyi" => "python",
        "ts" | "tsx" => "typescript",
        "js" | "jsx" | "mjs" | "cjs" => "javascript",
        "go" => "go",
        "rs" => "rust",
        "java" => "java",
        "kt" | "kts" => "kotlin",
        "rb" => "ruby",
        "php" => "php",
        "c" | "h" => "c",
        "cpp" | "cc" | "cxx" | "hpp" | "hh" => "cpp",
        "cs" => "csharp",
        "swift" => "swift",
        "scala" => "scala",
        "sh" | "bash" => "shell",
        "md" | "markdown" => "markdown",
        _ => UNKNOWN,
    }
}

/// [`LanguageDetector`] backed by [`detect_lang`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtensionDetector;

impl LanguageDetector for ExtensionDetector {
    fn detect(&self, path: &str) -> String {
        detect_lang(path).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_lang() {
        assert_eq!(detect_lang("main.py"), "python");
        assert_eq!(detect_lang("src/app.ts"), "typescript");
        assert_eq!(detect_lang("server.js"), "javascript");
        assert_eq!(detect_lang("cmd/main.go"), "go");
        assert_eq!(detect_lang("lib.RS"), "rust");
        assert_eq!(detect_lang("unknown.xyz"), "unknown");
    }

    #[test]
    fn test_no_extension() {
        assert_eq!(detect_lang("Makefile"), UNKNOWN);
        assert_eq!(detect_lang(".bashrc"), UNKNOWN);
        assert_eq!(detect_lang("dir.py/README"), UNKNOWN);
    }

    #[test]
    fn test_detector_trait() {
        assert_eq!(ExtensionDetector.detect("a/b/c.java"), "java");
    }
}
