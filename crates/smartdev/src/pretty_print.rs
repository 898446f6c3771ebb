//! Line-oriented pretty-printing for trees and detected devices.
//!
//! Used by the CLI and by tests to produce stable snapshot output.

use crate::detect::DetectedDevice;
use crate::detect::DetectorState;
use crate::detect::DeviceReport;
use crate::tree::TreeNode;

/// Trait for multi-line, indented pretty-printing.
pub trait PrettyPrint {
    fn pretty_print(&self, indent: usize, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result;

    fn to_pretty_string(&self) -> String {
        struct Wrapper<'a, T: PrettyPrint + ?Sized>(&'a T);
        impl<T: PrettyPrint + ?Sized> std::fmt::Display for Wrapper<'_, T> {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                self.0.pretty_print(0, f)
            }
        }
        Wrapper(self).to_string()
    }
}

fn write_indent(indent: usize, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    for _ in 0..indent {
        write!(f, "  ")?;
    }
    Ok(())
}

impl<T: PrettyPrint> PrettyPrint for [T] {
    fn pretty_print(&self, indent: usize, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for item in self {
            item.pretty_print(indent, f)?;
        }
        Ok(())
    }
}

impl PrettyPrint for TreeNode {
    fn pretty_print(&self, indent: usize, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write_indent(indent, f)?;
        write!(
            f,
            "#{} {} [{}] depth={} title={:?}",
            self.index, self.id, self.kind, self.depth, self.title
        )?;
        if let Some(parent) = &self.parent {
            match self.parent_index {
                Some(index) => write!(f, " parent={}#{}", parent, index)?,
                None => write!(f, " parent={}#?", parent)?,
            }
        }
        if self.synthesized {
            write!(f, " (synthesized)")?;
        }
        writeln!(f)
    }
}

impl PrettyPrint for DetectorState {
    fn pretty_print(&self, indent: usize, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write_indent(indent, f)?;
        write!(f, "{}: {}", self.name, self.id.as_deref().unwrap_or("-"))?;

        let mut flags = Vec::new();
        if self.read {
            flags.push("read");
        }
        if self.write {
            flags.push("write");
        }
        if self.indicator {
            flags.push("indicator");
        }
        if self.required {
            flags.push("required");
        }
        if self.no_type {
            flags.push("added");
        }
        if !flags.is_empty() {
            write!(f, " [{}]", flags.join(", "))?;
        }
        if let Some(role) = &self.default_role {
            write!(f, " role={}", role)?;
        }
        writeln!(f)
    }
}

impl PrettyPrint for DetectedDevice {
    fn pretty_print(&self, indent: usize, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write_indent(indent, f)?;
        writeln!(f, "Device: {} ({})", self.channel_id, self.device_type)?;
        self.states.pretty_print(indent + 1, f)
    }
}

impl PrettyPrint for DeviceReport {
    fn pretty_print(&self, indent: usize, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.device.pretty_print(indent, f)?;
        if !self.added.is_empty() {
            write_indent(indent + 1, f)?;
            writeln!(f, "Added:")?;
            self.added.pretty_print(indent + 2, f)?;
        }
        if !self.rooms.is_empty() {
            write_indent(indent + 1, f)?;
            writeln!(f, "Rooms: {}", self.rooms.join(", "))?;
        }
        if !self.functions.is_empty() {
            write_indent(indent + 1, f)?;
            writeln!(f, "Functions: {}", self.functions.join(", "))?;
        }
        Ok(())
    }
}
