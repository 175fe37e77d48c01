// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::Path,
};

use minijinja::{AutoEscape, Environment, UndefinedBehavior};
use serde::Serialize;

use crate::error::{Error, IoContext, Result};

/// Renders unit files and daemon configuration from text templates.
///
/// Undefined variables are errors: a template that references a field the data record does not
/// carry fails instead of writing an empty string into a unit file.
pub struct TemplateRenderer {
    env: Environment<'static>,
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateRenderer {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_keep_trailing_newline(true);
        env.set_auto_escape_callback(|_| AutoEscape::None);
        Self { env }
    }

    /// Render `template` with `data` into a string.
    pub fn render_str<S: Serialize>(&self, template: &str, name: &str, data: S) -> Result<String> {
        self.env
            .render_named_str(name, template, data)
            .map_err(|source| Error::Template {
                name: name.to_string(),
                source,
            })
    }

    /// Render `template` with `data` into `dest`, creating parent directories as needed and
    /// replacing whatever was at `dest` before. The file is synced before returning.
    ///
    /// Nothing is written if rendering fails.
    pub fn render<S: Serialize>(&self, template: &str, name: &str, dest: &Path, data: S) -> Result<()> {
        let rendered = self.render_str(template, name, data)?;

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).with_path("create directory", parent)?;
        }
        let file = File::create(dest).with_path("create", dest)?;
        let mut writer = BufWriter::new(file);
        writer
            .write_all(rendered.as_bytes())
            .with_path("write", dest)?;
        let file = writer
            .into_inner()
            .map_err(|e| e.into_error())
            .with_path("flush", dest)?;
        file.sync_all().with_path("sync", dest)?;
        Ok(())
    }
}
