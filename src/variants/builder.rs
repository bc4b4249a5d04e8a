// src/variants/builder.rs

//! Expand a [`Selection`] into ordered invocation variants.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::Serialize;
use tracing::warn;

use super::catalog::{self, Module, Preset};

/// What the caller asked for: a named preset XOR an explicit module set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Preset(String),
    Modules(BTreeMap<Module, bool>),
}

impl Selection {
    pub fn preset(name: impl Into<String>) -> Self {
        Selection::Preset(name.into())
    }

    /// Module set with every listed module enabled.
    pub fn modules<I>(modules: I) -> Self
    where
        I: IntoIterator<Item = Module>,
    {
        Selection::Modules(modules.into_iter().map(|m| (m, true)).collect())
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selection::Preset(name) => write!(f, "preset '{name}'"),
            Selection::Modules(map) => {
                let enabled: Vec<&str> = enabled_modules(map).iter().map(|m| m.name()).collect();
                write!(f, "modules [{}]", enabled.join(", "))
            }
        }
    }
}

/// Which flag set a variant carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VariantKind {
    /// The preset's own tool flag (e.g. `--min`).
    PresetNative,
    /// One flag per enabled module.
    ModuleFlags,
    /// No flags at all; the tool's own defaults.
    Bare,
}

/// One concrete command line: launcher, entry point, input path, flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationVariant {
    tokens: Vec<String>,
    kind: VariantKind,
}

impl InvocationVariant {
    pub fn new(tokens: Vec<String>, kind: VariantKind) -> Self {
        debug_assert!(!tokens.is_empty());
        Self { tokens, kind }
    }

    pub fn program(&self) -> &str {
        &self.tokens[0]
    }

    pub fn args(&self) -> &[String] {
        &self.tokens[1..]
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn kind(&self) -> VariantKind {
        self.kind
    }

    /// Flags after launcher, entry point and input path.
    pub fn flags(&self) -> &[String] {
        self.tokens.get(3..).unwrap_or(&[])
    }
}

impl fmt::Display for InvocationVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tokens.join(" "))
    }
}

/// Inputs the builder needs besides the selection.
#[derive(Debug, Clone, Copy)]
pub struct VariantContext<'a> {
    pub launchers: &'a [String],
    pub entrypoint: &'a str,
    pub input_path: &'a Path,
    pub default_preset: &'a str,
    pub bare_fallback: bool,
}

/// Build the ordered variant list for `selection`.
///
/// Order: flag sets from most to least specific (primary, module expansion of
/// a native preset, bare), each tried on every launcher in preference order.
/// Duplicate command lines are dropped, keeping the first.
pub fn build(selection: &Selection, ctx: &VariantContext<'_>) -> Vec<InvocationVariant> {
    let mut flag_sets = primary_flag_sets(selection, ctx);
    if ctx.bare_fallback {
        flag_sets.push((VariantKind::Bare, Vec::new()));
    }

    let input = ctx.input_path.to_string_lossy();
    let mut variants: Vec<InvocationVariant> = Vec::new();
    for (kind, flags) in &flag_sets {
        for launcher in ctx.launchers {
            let mut tokens = vec![
                launcher.clone(),
                ctx.entrypoint.to_string(),
                input.to_string(),
            ];
            tokens.extend(flags.iter().map(|f| f.to_string()));

            if !variants.iter().any(|v| v.tokens == tokens) {
                variants.push(InvocationVariant::new(tokens, *kind));
            }
        }
    }
    variants
}

fn primary_flag_sets(
    selection: &Selection,
    ctx: &VariantContext<'_>,
) -> Vec<(VariantKind, Vec<&'static str>)> {
    match selection {
        Selection::Preset(name) => match catalog::find_preset(name) {
            Some(preset) => preset_flag_sets(preset),
            None => {
                warn!(
                    preset = %name,
                    fallback = %ctx.default_preset,
                    "unknown preset; using default preset"
                );
                preset_flag_sets(default_preset(ctx))
            }
        },
        Selection::Modules(map) => {
            let enabled = enabled_modules(map);
            if enabled.is_empty() {
                warn!(
                    fallback = %ctx.default_preset,
                    "empty module selection; using default preset"
                );
                preset_flag_sets(default_preset(ctx))
            } else {
                vec![(
                    VariantKind::ModuleFlags,
                    enabled.iter().map(|m| m.flag()).collect(),
                )]
            }
        }
    }
}

fn preset_flag_sets(preset: &Preset) -> Vec<(VariantKind, Vec<&'static str>)> {
    let module_flags: Vec<&'static str> = preset.modules.iter().map(|m| m.flag()).collect();
    match preset.native_flag {
        Some(native) => vec![
            (VariantKind::PresetNative, vec![native]),
            (VariantKind::ModuleFlags, module_flags),
        ],
        None => vec![(VariantKind::ModuleFlags, module_flags)],
    }
}

fn default_preset(ctx: &VariantContext<'_>) -> &'static Preset {
    catalog::find_preset(ctx.default_preset).unwrap_or_else(catalog::least_invasive)
}

/// Enabled modules in catalog order.
fn enabled_modules(map: &BTreeMap<Module, bool>) -> Vec<Module> {
    // BTreeMap iterates in `Module`'s declaration order.
    map.iter()
        .filter(|&(_, on)| *on)
        .map(|(m, _)| *m)
        .collect()
}
