//! Shared test utilities for integration and E2E tests.
//!
//! This module provides common fixtures, helper functions, and configuration
//! snippets to reduce duplication across test files.
//!
//! ## Usage
//!
//! Add `mod common;` to your test file, then use the helpers:
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! #[test]
//! fn test_example() {
//!     let fixture = TestFixture::new()
//!         .with_template("web/README.md", "{{.Title}}")
//!         .with_service_config(configs::WEB_SERVICE);
//!     // ... test code
//! }
//! ```

use assert_fs::prelude::*;
use std::path::{Path, PathBuf};

/// Re-export commonly used test dependencies for convenience.
#[allow(unused_imports)]
pub mod prelude {
    pub use assert_cmd::cargo::cargo_bin_cmd;
    pub use assert_fs::prelude::*;
    pub use assert_fs::TempDir;
    pub use predicates::prelude::*;

    pub use super::configs;
    pub use super::TestFixture;
}

/// Common configuration YAML snippets for testing.
#[allow(dead_code)]
pub mod configs {
    /// Service configuration selecting the `web` template set.
    pub const WEB_SERVICE: &str = r#"
title: demo
displayName: Demo Service
serviceName: demo-svc
description: A demo service
type: web
protocol: http
"#;

    /// Service configuration with ignore patterns.
    pub const NODE_SERVICE: &str = r#"
title: frontend
type: node
buildIgnore:
  - "*.secret"
  - "node_modules/"
"#;

    /// Service configuration without a type.
    pub const NO_TYPE: &str = "title: orphan\n";

    /// Fleet configuration with two repositories.
    pub const FLEET: &str = r#"
repositories:
  - acme/api
  - acme/web
templates: templates
"#;

    /// Fleet configuration with no repositories.
    pub const EMPTY_FLEET: &str = "repositories: []\n";
}

/// A temporary directory laid out like a kopier run:
/// `templates/` holds template sets, `checkout/` is a target tree and
/// `config.yml` is the fleet configuration.
pub struct TestFixture {
    temp_dir: assert_fs::TempDir,
}

#[allow(dead_code)]
impl TestFixture {
    /// Create a new fixture with empty `templates/` and `checkout/` directories.
    pub fn new() -> Self {
        let temp_dir = assert_fs::TempDir::new().expect("Failed to create temp directory");
        temp_dir
            .child("templates")
            .create_dir_all()
            .expect("Failed to create templates directory");
        temp_dir
            .child("checkout")
            .create_dir_all()
            .expect("Failed to create checkout directory");
        Self { temp_dir }
    }

    /// Add a template file, with a path starting at the template set name
    /// (for example `web/README.md`).
    pub fn with_template(self, path: &str, content: &str) -> Self {
        self.temp_dir
            .child("templates")
            .child(path)
            .write_str(content)
            .expect("Failed to write template");
        self
    }

    /// Add an empty template set.
    pub fn with_template_dir(self, kind: &str) -> Self {
        self.temp_dir
            .child("templates")
            .child(kind)
            .create_dir_all()
            .expect("Failed to create template set");
        self
    }

    /// Add a binary template file.
    pub fn with_binary_template(self, path: &str, content: &[u8]) -> Self {
        self.temp_dir
            .child("templates")
            .child(path)
            .write_binary(content)
            .expect("Failed to write template");
        self
    }

    /// Write `service-config.yaml` into the checkout.
    pub fn with_service_config(self, content: &str) -> Self {
        self.with_checkout_file("service-config.yaml", content)
    }

    /// Add a file to the checkout.
    pub fn with_checkout_file(self, path: &str, content: &str) -> Self {
        self.temp_dir
            .child("checkout")
            .child(path)
            .write_str(content)
            .expect("Failed to write checkout file");
        self
    }

    /// Write `config.yml` at the fixture root.
    pub fn with_fleet_config(self, content: &str) -> Self {
        self.temp_dir
            .child("config.yml")
            .write_str(content)
            .expect("Failed to write fleet config");
        self
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn templates_path(&self) -> PathBuf {
        self.temp_dir.path().join("templates")
    }

    pub fn checkout_path(&self) -> PathBuf {
        self.temp_dir.path().join("checkout")
    }

    pub fn config_path(&self) -> PathBuf {
        self.temp_dir.path().join("config.yml")
    }

    /// A child path inside the checkout.
    pub fn checkout(&self, path: &str) -> assert_fs::fixture::ChildPath {
        self.temp_dir.child("checkout").child(path)
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}
