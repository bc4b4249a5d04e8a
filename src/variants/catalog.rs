// src/variants/catalog.rs

//! Static preset and module catalogs for the Hercules obfuscator.

use std::fmt;
use std::str::FromStr;

/// How safe a module is to enable on arbitrary Lua code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stability {
    Stable,
    MayConflict,
    Advanced,
}

impl fmt::Display for Stability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stability::Stable => "stable",
            Stability::MayConflict => "may cause issues",
            Stability::Advanced => "advanced",
        };
        f.write_str(s)
    }
}

/// A single obfuscation module. Declaration order is the order flags are
/// emitted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Module {
    VarRenaming,
    GarbageCode,
    Compressor,
    ControlFlow,
    StringEncoding,
    OpaquePredicates,
    Vm,
    AntiTamper,
    WrapAliases,
    EncAliases,
}

impl Module {
    pub const ALL: [Module; 10] = [
        Module::VarRenaming,
        Module::GarbageCode,
        Module::Compressor,
        Module::ControlFlow,
        Module::StringEncoding,
        Module::OpaquePredicates,
        Module::Vm,
        Module::AntiTamper,
        Module::WrapAliases,
        Module::EncAliases,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Module::VarRenaming => "varrenaming",
            Module::GarbageCode => "garbagecode",
            Module::Compressor => "compressor",
            Module::ControlFlow => "controlflow",
            Module::StringEncoding => "stringencoding",
            Module::OpaquePredicates => "opaquepredicates",
            Module::Vm => "vm",
            Module::AntiTamper => "antitamper",
            Module::WrapAliases => "wrapaliases",
            Module::EncAliases => "encaliases",
        }
    }

    pub fn flag(self) -> &'static str {
        match self {
            Module::VarRenaming => "--varrenaming",
            Module::GarbageCode => "--garbagecode",
            Module::Compressor => "--compressor",
            Module::ControlFlow => "--controlflow",
            Module::StringEncoding => "--stringencoding",
            Module::OpaquePredicates => "--opaquepredicates",
            Module::Vm => "--vm",
            Module::AntiTamper => "--antitamper",
            Module::WrapAliases => "--wrapaliases",
            Module::EncAliases => "--encaliases",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Module::VarRenaming => "Rename variables to random names",
            Module::GarbageCode => "Insert fake/dead code",
            Module::Compressor => "Compress the output",
            Module::ControlFlow => "Control flow obfuscation",
            Module::StringEncoding => "Encode strings",
            Module::OpaquePredicates => "Add confusing conditions",
            Module::Vm => "Virtual machine protection",
            Module::AntiTamper => "Tamper detection",
            Module::WrapAliases => "Wrap function aliases",
            Module::EncAliases => "Encode aliases",
        }
    }

    pub fn stability(self) -> Stability {
        match self {
            Module::VarRenaming | Module::GarbageCode | Module::Compressor => Stability::Stable,
            Module::ControlFlow | Module::StringEncoding | Module::OpaquePredicates => {
                Stability::MayConflict
            }
            Module::Vm | Module::AntiTamper | Module::WrapAliases | Module::EncAliases => {
                Stability::Advanced
            }
        }
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Module {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().trim_start_matches("--").to_lowercase();
        Module::ALL
            .into_iter()
            .find(|m| m.name() == wanted)
            .ok_or_else(|| {
                let known: Vec<&str> = Module::ALL.iter().map(|m| m.name()).collect();
                format!("unknown module '{}' (expected one of: {})", s.trim(), known.join(", "))
            })
    }
}

/// A named preset: an optional native tool flag plus its module expansion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preset {
    pub name: &'static str,
    pub native_flag: Option<&'static str>,
    pub modules: &'static [Module],
    pub description: &'static str,
}

pub static PRESETS: [Preset; 5] = [
    Preset {
        name: "safe",
        native_flag: None,
        modules: &[Module::VarRenaming, Module::GarbageCode],
        description: "Variable renaming + garbage code (most stable)",
    },
    Preset {
        name: "min",
        native_flag: Some("--min"),
        modules: &[Module::VarRenaming, Module::GarbageCode],
        description: "Light obfuscation",
    },
    Preset {
        name: "mid",
        native_flag: Some("--mid"),
        modules: &[
            Module::VarRenaming,
            Module::GarbageCode,
            Module::Compressor,
            Module::WrapAliases,
        ],
        description: "Balanced: adds compressor and wrapped aliases",
    },
    Preset {
        name: "max",
        native_flag: Some("--max"),
        modules: &[
            Module::VarRenaming,
            Module::GarbageCode,
            Module::Compressor,
            Module::Vm,
            Module::WrapAliases,
            Module::EncAliases,
        ],
        description: "Heavy: adds encoded aliases and the VM",
    },
    Preset {
        name: "vm",
        native_flag: None,
        modules: &[Module::VarRenaming, Module::GarbageCode, Module::Vm],
        description: "Variable renaming + virtual machine",
    },
];

/// The least invasive preset, used when nothing better is configured.
pub const LEAST_INVASIVE: &str = "safe";

pub fn find_preset(name: &str) -> Option<&'static Preset> {
    let name = name.trim().to_lowercase();
    PRESETS.iter().find(|p| p.name == name)
}

pub fn least_invasive() -> &'static Preset {
    find_preset(LEAST_INVASIVE).unwrap_or(&PRESETS[0])
}

pub fn preset_names() -> Vec<&'static str> {
    PRESETS.iter().map(|p| p.name).collect()
}
