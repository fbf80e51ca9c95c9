//! Writing composed styles: inline into the component or into a bundle file.

use crate::errors::{PreprocessError, Result};
use crate::splice::SourceEditor;
use std::io::Write;
use std::path::Path;
use tracing::debug;

/// Append a `<style>` block holding `css` to the edited component
pub fn inject_style(editor: &mut SourceEditor<'_>, css: &str) {
    editor.trim_end().append(&format!("\n\n<style>\n{}</style>", css));
}

/// Replace the bundle file in one step. On failure the previous bundle is left
/// intact.
pub fn write_bundle(path: &Path, css: &str) -> Result<()> {
    write_atomic(path, css).map_err(|e| PreprocessError::OutputError {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    debug!(path = %path.display(), bytes = css.len(), "bundle written");
    Ok(())
}

/// Write to a temporary file next to `path`, then rename over it
pub fn write_atomic<P: AsRef<Path>>(path: P, content: &str) -> std::io::Result<()> {
    let path = path.as_ref();
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;

    let mut file = tempfile::NamedTempFile::new_in(parent)?;
    file.write_all(content.as_bytes())?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_inject_style() {
        let mut editor = SourceEditor::new("<div class=\"p-4\"></div>\n");
        inject_style(&mut editor, ".p-4 {\n  padding: 1rem;\n}\n");
        assert_eq!(
            editor.finish(),
            "<div class=\"p-4\"></div>\n\n<style>\n.p-4 {\n  padding: 1rem;\n}\n</style>"
        );
    }

    #[test]
    fn test_write_bundle_replaces_whole_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("css").join("bundle.css");
        write_bundle(&path, ".a{color:red}").unwrap();
        write_bundle(&path, ".b{color:blue}").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), ".b{color:blue}");
        // no temporary files left behind
        let entries = std::fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[test]
    fn test_write_bundle_failure_keeps_previous() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bundle.css");
        write_bundle(&path, ".a{color:red}").unwrap();

        // a directory where the file should go cannot be replaced
        let blocked = dir.path().join("blocked");
        std::fs::create_dir_all(blocked.join("inner")).unwrap();
        let err = write_bundle(&blocked, ".b{}").unwrap_err();
        assert!(matches!(err, PreprocessError::OutputError { .. }));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), ".a{color:red}");
    }
}
