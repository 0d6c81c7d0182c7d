//! Phase 2: Template Rendering
//!
//! Every regular file in the scratch workspace is treated as a template and
//! rendered in place against the repository's configuration.
//!
//! ## Rules
//!
//! - The file's base name is the template identifier.
//! - A parse or execution failure aborts the whole render with a template
//!   error naming the file. Files rendered before the failure stay rendered,
//!   but the workspace is discarded by the caller anyway.
//! - An empty result means the file is not meant to be templated; it keeps
//!   its original content and a notice is logged.
//! - A non-empty result overwrites the file.
//! - Files that are not UTF-8 text are passed through untouched.
//!
//! ## Syntax
//!
//! Only `{{ ... }}` actions are template syntax; all other text, including
//! `{% ... %}`, `{# ... #}` and shell forms such as `${#x}`, is copied
//! through. Actions are evaluated by Handlebars. Actions written in the older
//! Go-template style are rewritten first:
//!
//! | Written                      | Evaluated as                    |
//! |------------------------------|---------------------------------|
//! | `{{.Title}}`                 | `{{Title}}`                     |
//! | `{{.}}`, `{{$.Title}}`       | `{{this}}`, `{{@root.Title}}`   |
//! | `{{if eq .Protocol "grpc"}}` | `{{#if (eq Protocol "grpc")}}`  |
//! | `{{range .Build.Ignore}}`    | `{{#each Build.Ignore}}`        |
//! | `{{with .X}}`                | `{{#with X}}`                   |
//! | `{{end}}`                    | the matching `{{/if}}`, ...     |
//! | `{{/* note */}}`             | `{{!-- note --}}`               |
//! | `{{"{{"}}`                   | a literal `{{`                  |
//! | `{{- .X -}}`                 | `{{~X~}}`                       |
//!
//! The context exposes every configuration field under both its YAML key and
//! its capitalised name.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use handlebars::Handlebars;
use log::{debug, info, warn};
use regex::{Captures, Regex};
use serde_json::{json, Map, Value};
use walkdir::WalkDir;

use crate::config::RepoConfig;
use crate::error::{Error, Result};
use crate::workspace::relative_to;

/// Explicit rendering context built from one repository's configuration.
#[derive(Debug, Clone)]
pub struct RenderContext {
    data: Map<String, Value>,
}

impl RenderContext {
    pub fn from_config(config: &RepoConfig) -> Self {
        let mut data = Map::new();

        // Known fields are inserted last so extra keys cannot shadow them.
        for (key, value) in &config.extra {
            match serde_json::to_value(value) {
                Ok(value) => {
                    data.insert(key.clone(), value);
                }
                Err(e) => warn!("Leaving {} out of the template context: {}", key, e),
            }
        }

        let text_fields = [
            ("title", "Title", &config.title),
            ("displayName", "DisplayName", &config.display_name),
            ("serviceName", "ServiceName", &config.service_name),
            ("description", "Description", &config.description),
            ("type", "Type", &config.kind),
            ("protocol", "Protocol", &config.protocol),
        ];
        for (key, legacy_key, value) in text_fields {
            data.insert(key.to_string(), Value::String(value.clone()));
            data.insert(legacy_key.to_string(), Value::String(value.clone()));
        }

        data.insert("build".to_string(), json!({ "ignore": &config.build.ignore }));
        data.insert("Build".to_string(), json!({ "Ignore": &config.build.ignore }));
        data.insert("buildIgnore".to_string(), json!(&config.build_ignore));

        Self { data }
    }
}

/// Outcome of rendering a single template
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rendered {
    /// The template produced output
    Output(String),
    /// The template produced nothing; the file is left as it was
    Empty,
}

fn action_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?s)\{\{(-\s+)?(.*?)(\s+-)?\}\}").expect("action pattern is valid")
    })
}

fn token_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#""(?:[^"\\]|\\.)*"|`[^`]*`|\S+"#).expect("token pattern is valid")
    })
}

/// Rewrite one Go-style argument list into a Handlebars expression.
/// Calls with arguments are parenthesised when `nested` is set so they can
/// be used as a block helper parameter.
fn translate_expression(args: &str, nested: bool) -> String {
    let tokens: Vec<String> = token_pattern()
        .find_iter(args)
        .map(|token| match token.as_str() {
            "." => "this".to_string(),
            "$" => "@root".to_string(),
            t if t.starts_with("$.") => format!("@root.{}", &t[2..]),
            t if t.starts_with('.') && t.len() > 1 => t[1..].to_string(),
            t => t.to_string(),
        })
        .collect();
    let expression = tokens.join(" ");
    if nested && tokens.len() > 1 {
        format!("({})", expression)
    } else {
        expression
    }
}

/// Decode a Go string literal action into the text it stands for.
fn literal_text(body: &str) -> Option<String> {
    if body.len() >= 2 && body.starts_with('`') && body.ends_with('`') {
        return Some(body[1..body.len() - 1].to_string());
    }
    if body.len() >= 2 && body.starts_with('"') && body.ends_with('"') {
        return serde_json::from_str::<String>(body).ok();
    }
    None
}

/// Rewrite Go-template style actions into Handlebars syntax.
///
/// Text outside `{{ ... }}` is never touched. Actions already written for
/// Handlebars pass through as they are.
pub fn translate_actions(name: &str, source: &str) -> Result<String> {
    let mut blocks: Vec<&'static str> = Vec::new();
    let mut failure: Option<String> = None;

    let translated = action_pattern().replace_all(source, |caps: &Captures| {
        let whole = &caps[0];
        let body = caps[2].trim();
        let open = if caps.get(1).is_some() { "{{~" } else { "{{" };
        let close = if caps.get(3).is_some() { "~}}" } else { "}}" };

        if body.starts_with("/*") && body.ends_with("*/") && body.len() >= 4 {
            return format!("{}!--{}--{}", open, &body[2..body.len() - 2], close);
        }
        if let Some(text) = literal_text(body) {
            return text.replace("{{", "\\{{");
        }

        let (keyword, args) = match body.split_once(char::is_whitespace) {
            Some((keyword, args)) => (keyword, args.trim()),
            None => (body, ""),
        };
        let rewritten = match keyword {
            "if" | "range" | "with" => {
                let (helper, closing) = match keyword {
                    "if" => ("if", "/if"),
                    "range" => ("each", "/each"),
                    _ => ("with", "/with"),
                };
                blocks.push(closing);
                format!("#{} {}", helper, translate_expression(args, true))
            }
            "else" if args.is_empty() => "else".to_string(),
            "else" => match args.split_once(char::is_whitespace) {
                Some(("if", rest)) => format!("else if {}", translate_expression(rest, true)),
                _ => return whole.to_string(),
            },
            "end" if args.is_empty() => match blocks.pop() {
                Some(closing) => closing.to_string(),
                None => {
                    failure.get_or_insert_with(|| "unexpected {{end}}".to_string());
                    return whole.to_string();
                }
            },
            _ if body.starts_with('.') || body.starts_with('$') => translate_expression(body, false),
            _ => return whole.to_string(),
        };
        format!("{}{}{}", open, rewritten, close)
    });

    if let Some(message) = failure {
        return Err(Error::Template {
            file: PathBuf::from(name),
            message,
        });
    }
    Ok(translated.into_owned())
}

fn describe(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let cause_message = cause.to_string();
        if !message.contains(&cause_message) {
            message.push_str(": ");
            message.push_str(&cause_message);
        }
        source = cause.source();
    }
    message
}

/// Render one template. Pure: the same inputs always give the same output.
pub fn render_template(name: &str, source: &str, context: &RenderContext) -> Result<Rendered> {
    let template_error = |err: &dyn std::error::Error| Error::Template {
        file: PathBuf::from(name),
        message: describe(err),
    };

    let mut handlebars = Handlebars::new();
    handlebars.set_strict_mode(true);
    handlebars.register_escape_fn(handlebars::no_escape);
    handlebars
        .register_template_string(name, translate_actions(name, source)?)
        .map_err(|e| template_error(&e))?;
    let output = handlebars
        .render(name, &context.data)
        .map_err(|e| template_error(&e))?;

    if output.is_empty() {
        Ok(Rendered::Empty)
    } else {
        Ok(Rendered::Output(output))
    }
}

/// Files touched by a render, relative to the workspace root
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderReport {
    /// Overwritten with non-empty output
    pub rendered: Vec<PathBuf>,
    /// Rendered to nothing and left as they were
    pub untemplated: Vec<PathBuf>,
    /// Not UTF-8 text, passed through
    pub binary: Vec<PathBuf>,
}

/// Execute Phase 2: render every file under `workspace` in place.
pub fn execute(workspace: &Path, context: &RenderContext) -> Result<RenderReport> {
    let mut report = RenderReport::default();

    for entry in WalkDir::new(workspace).min_depth(1) {
        let entry = entry.map_err(|e| Error::Overlay {
            path: e
                .path()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| workspace.to_path_buf()),
            message: e.to_string(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = relative_to(path, workspace)?;
        let bytes = fs::read(path).map_err(|e| Error::Overlay {
            path: path.to_path_buf(),
            message: format!("failed to read template: {}", e),
        })?;
        let Ok(source) = String::from_utf8(bytes) else {
            debug!("{} is not UTF-8 text, passing through", relative.display());
            report.binary.push(relative);
            continue;
        };

        let name = entry.file_name().to_string_lossy();
        let rendered = render_template(&name, &source, context).map_err(|e| match e {
            Error::Template { message, .. } => Error::Template {
                file: relative.clone(),
                message,
            },
            other => other,
        })?;

        match rendered {
            Rendered::Empty => {
                info!("{} was not templated ({})", name, relative.display());
                report.untemplated.push(relative);
            }
            Rendered::Output(output) => {
                if output != source {
                    fs::write(path, output.as_bytes()).map_err(|e| Error::Overlay {
                        path: path.to_path_buf(),
                        message: format!("failed to write rendered template: {}", e),
                    })?;
                }
                report.rendered.push(relative);
            }
        }
    }

    Ok(report)
}
