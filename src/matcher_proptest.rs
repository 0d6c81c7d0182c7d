//! Property-based tests for ignore matching and the overlay engine.
//!
//! These tests use proptest to generate random template trees and verify that
//! the overlay invariants hold for all of them.

#[cfg(test)]
mod proptest_tests {
    use std::collections::BTreeSet;
    use std::fs;
    use std::path::{Path, PathBuf};

    use proptest::prelude::*;
    use tempfile::TempDir;

    use crate::config::parse_repo_config;
    use crate::matcher::IgnoreMatcher;
    use crate::phases::overlay;
    use crate::phases::render::{render_template, RenderContext};

    fn file_path() -> impl Strategy<Value = PathBuf> {
        (
            prop::collection::vec("[a-z]{1,4}", 0..3),
            "[a-z]{1,4}",
            prop::sample::select(vec!["txt", "md", "secret", "yml"]),
        )
            .prop_map(|(dirs, stem, ext)| {
                let mut path: PathBuf = dirs.iter().collect();
                path.push(format!("{}.{}", stem, ext));
                path
            })
    }

    fn file_tree() -> impl Strategy<Value = BTreeSet<PathBuf>> {
        prop::collection::btree_set(file_path(), 1..12)
    }

    fn materialize(files: &BTreeSet<PathBuf>) -> TempDir {
        let dir = TempDir::new().unwrap();
        for path in files {
            let full = dir.path().join(path);
            fs::create_dir_all(full.parent().unwrap()).unwrap();
            fs::write(&full, path.to_string_lossy().as_bytes()).unwrap();
        }
        dir
    }

    fn is_under(path: &Path, dir: &str) -> bool {
        path.components()
            .rev()
            .skip(1)
            .any(|c| c.as_os_str() == dir)
    }

    // ============================================================================
    // Overlay property tests
    // ============================================================================

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        /// Property: with no ignore patterns every file lands at the same
        /// relative path with the same content
        #[test]
        fn overlay_without_patterns_copies_every_file(files in file_tree()) {
            let workspace = materialize(&files);
            let target = TempDir::new().unwrap();

            overlay::execute(workspace.path(), None, target.path()).unwrap();

            for path in &files {
                let copied = fs::read(target.path().join(path)).unwrap();
                prop_assert_eq!(copied, path.to_string_lossy().as_bytes().to_vec());
            }
        }

        /// Property: a file matching an ignore pattern is never copied
        #[test]
        fn overlay_never_copies_ignored_files(files in file_tree()) {
            let workspace = materialize(&files);
            let target = TempDir::new().unwrap();
            let matcher = IgnoreMatcher::new(&["*.secret"]);

            let report = overlay::execute(workspace.path(), Some(&matcher), target.path()).unwrap();

            for path in &files {
                let present = target.path().join(path).exists();
                let is_secret = path.extension().is_some_and(|e| e == "secret");
                prop_assert_eq!(present, !is_secret, "unexpected state for {}", path.display());
            }
            prop_assert!(report.copied.iter().all(|p| p.extension().is_none_or(|e| e != "secret")));
        }

        /// Property: an ignored directory contributes none of its descendants
        #[test]
        fn overlay_ignored_directory_contributes_nothing(
            files in file_tree(),
            dir in "[a-z]{1,4}",
        ) {
            let workspace = materialize(&files);
            let target = TempDir::new().unwrap();
            let pattern = format!("{}/", dir);
            let matcher = IgnoreMatcher::new(&[pattern.as_str()]);

            overlay::execute(workspace.path(), Some(&matcher), target.path()).unwrap();

            for path in &files {
                let present = target.path().join(path).exists();
                prop_assert_eq!(present, !is_under(path, &dir), "unexpected state for {}", path.display());
            }
        }

        /// Property: the matcher agrees with the walk about descendants of an
        /// ignored directory
        #[test]
        fn matcher_excludes_descendants_of_ignored_directory(path in file_path()) {
            let matcher = IgnoreMatcher::new(&["*/"]);
            let nested = path.components().count() > 1;
            prop_assert_eq!(matcher.matches(&path, false), nested);
        }
    }

    // ============================================================================
    // Render property tests
    // ============================================================================

    proptest! {
        /// Property: rendering is deterministic
        #[test]
        fn render_is_deterministic(title in "[A-Za-z0-9 ]{0,16}", prefix in "[a-z ]{0,8}") {
            let config = parse_repo_config(&format!("title: '{}'\ntype: web", title)).unwrap();
            let context = RenderContext::from_config(&config);
            let source = format!("{}{{{{.Title}}}}", prefix);

            let first = render_template("t", &source, &context).unwrap();
            let second = render_template("t", &source, &context).unwrap();
            prop_assert_eq!(first, second);
        }

        /// Property: text without `{{` passes through unchanged, whatever
        /// other braces, hashes or percent signs it holds
        #[test]
        fn render_plain_text_is_identity(text in "[A-Za-z0-9 .,\n{}#%$]{1,64}") {
            prop_assume!(!text.contains("{{"));
            let config = parse_repo_config("type: web").unwrap();
            let context = RenderContext::from_config(&config);
            let rendered = render_template("t", &text, &context).unwrap();
            prop_assert_eq!(rendered, crate::phases::render::Rendered::Output(text));
        }
    }
}
