// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Settings template rendering.
//!
//! Settings files are templates evaluated against a context object before
//! being deserialized. Any rendering engine can be plugged in through
//! [`TemplateRenderer`].
//!
//! The stock renderer is [`JinjaRenderer`]. Properties are substituted with
//! `${dotted.path}`, and settings can branch or repeat with the usual
//! `{% if %}` and `{% for %}` blocks:
//!
//! ```text
//! {
//!   "num_workers": {% if environment == "prod" %}8{% else %}1{% endif %},
//!   "libraries": [
//!     {% for path in extra_jars %}{ "jar": "${path}" }{% if not loop.last %},{% endif %}
//!     {% endfor %}
//!   ]
//! }
//! ```

use minijinja::{
    escape_formatter, syntax::SyntaxConfig, Environment, Error as JinjaError, Output, State,
    UndefinedBehavior, Value,
};
use std::fmt::Write;

/// Render template text against a context object.
pub trait TemplateRenderer: Send + Sync + 'static {
    /// Produce document text from template and context.
    fn render(&self, template: &str, context: &serde_json::Value) -> Result<String>;
}

/// Jinja renderer for JSON settings documents.
///
/// Strings are written JSON-escaped without surrounding quotes, so a value
/// holding quotes or backslashes still lands inside a string literal intact.
/// Everything else is written as-is. Referencing a property the context does
/// not have is an error.
#[derive(Debug, Clone)]
pub struct JinjaRenderer {
    env: Environment<'static>,
}

impl JinjaRenderer {
    /// Construct new renderer.
    ///
    /// # Errors
    ///
    /// - Return [`TemplateError::Syntax`] if the `${ }` delimiters are
    ///   rejected by the engine.
    pub fn new() -> Result<Self> {
        let syntax = SyntaxConfig::builder()
            .variable_delimiters("${", "}")
            .build()
            .map_err(|err| TemplateError::Syntax { source: err })?;

        let mut env = Environment::new();
        env.set_syntax(syntax);
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_keep_trailing_newline(true);
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        env.set_formatter(json_formatter);

        Ok(Self { env })
    }
}

impl TemplateRenderer for JinjaRenderer {
    /// Render template.
    ///
    /// # Errors
    ///
    /// - Return [`TemplateError::Render`] if the template is malformed, or
    ///   names a property missing from the context.
    fn render(&self, template: &str, context: &serde_json::Value) -> Result<String> {
        self.env
            .render_str(template, context)
            .map_err(|err| TemplateError::Render { source: err })
    }
}

fn json_formatter(
    out: &mut Output<'_>,
    state: &State<'_, '_>,
    value: &Value,
) -> Result<(), JinjaError> {
    let Some(text) = value.as_str() else {
        return escape_formatter(out, state, value);
    };

    let quoted = serde_json::Value::String(text.to_string()).to_string();
    let escaped = quoted
        .strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
        .unwrap_or(&quoted);
    out.write_str(escaped)?;

    Ok(())
}

/// Template rendering error types.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    /// Template syntax cannot be configured.
    #[error("failed to configure template syntax")]
    Syntax {
        #[source]
        source: JinjaError,
    },

    /// Template cannot be rendered against the context.
    #[error("failed to render template")]
    Render {
        #[source]
        source: JinjaError,
    },
}

/// Friendly result alias :3
pub type Result<T, E = TemplateError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use minijinja::ErrorKind;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn render_replaces_nested_properties() -> anyhow::Result<()> {
        let context = json!({
            "artifact_path": "s3://bucket/app.jar",
            "project": { "version": "1.2.3", "workers": 4 }
        });
        let template = indoc! {r#"
            {
              "jar": "${artifact_path}",
              "version": "${ project.version }",
              "num_workers": ${project.workers}
            }
        "#};

        let result = JinjaRenderer::new()?.render(template, &context)?;
        let expect = indoc! {r#"
            {
              "jar": "s3://bucket/app.jar",
              "version": "1.2.3",
              "num_workers": 4
            }
        "#};
        assert_eq!(result, expect);

        Ok(())
    }

    #[test]
    fn render_branches_on_context() -> anyhow::Result<()> {
        let template = indoc! {r#"
            {
            {% if environment == "prod" %}
              "num_workers": 8
            {% else %}
              "num_workers": 1
            {% endif %}
            }
        "#};
        let renderer = JinjaRenderer::new()?;

        let result = renderer.render(template, &json!({ "environment": "prod" }))?;
        assert_eq!(result, "{\n  \"num_workers\": 8\n}\n");

        let result = renderer.render(template, &json!({ "environment": "qa" }))?;
        assert_eq!(result, "{\n  \"num_workers\": 1\n}\n");

        Ok(())
    }

    #[test]
    fn render_repeats_over_lists() -> anyhow::Result<()> {
        let context = json!({ "jars": ["dbfs:/libs/a.jar", "dbfs:/libs/b.jar"] });
        let template = indoc! {r#"
            [
            {% for jar in jars %}
              { "jar": "${jar}" }{% if not loop.last %},{% endif %}
            {% endfor %}
            ]
        "#};

        let result = JinjaRenderer::new()?.render(template, &context)?;
        let document: serde_json::Value = serde_json::from_str(&result)?;
        assert_eq!(
            document,
            json!([{ "jar": "dbfs:/libs/a.jar" }, { "jar": "dbfs:/libs/b.jar" }])
        );

        Ok(())
    }

    #[test]
    fn render_escapes_strings_for_json() -> anyhow::Result<()> {
        let awkward = "C:\\jobs\\\"nightly\"\nrun";
        let context = json!({ "description": awkward });
        let template = r#"{ "description": "${description}" }"#;

        let result = JinjaRenderer::new()?.render(template, &context)?;
        let document: serde_json::Value = serde_json::from_str(&result)?;
        assert_eq!(document["description"], awkward);

        Ok(())
    }

    #[test]
    fn render_rejects_missing_property() -> anyhow::Result<()> {
        let result = JinjaRenderer::new()?.render("${nope.value}", &json!({}));
        let Err(TemplateError::Render { source }) = result else {
            panic!("expected render failure");
        };
        assert_eq!(source.kind(), ErrorKind::UndefinedError);

        Ok(())
    }

    #[test]
    fn render_leaves_plain_text_alone() -> anyhow::Result<()> {
        let result = JinjaRenderer::new()?.render("$HOME and {braces}", &json!({}))?;
        assert_eq!(result, "$HOME and {braces}");
        Ok(())
    }
}
