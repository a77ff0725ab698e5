//! Plain-text catalog summary, embedded in prompts and printed by the CLI.

use std::fmt::Write;

use indexmap::IndexMap;

use crate::catalog::Catalog;
use crate::types::SocketType;

/// Describes every visible node type, in catalog order.
pub fn node_summaries(catalog: &dyn Catalog) -> String {
    let mut out = String::new();
    for type_name in catalog.list_types() {
        let Some(entry) = catalog.describe(type_name) else {
            continue;
        };

        // Writing into a String cannot fail.
        let _ = writeln!(out, "Node: '{}'", type_name);
        if let Some(description) = entry.description.as_deref().map(str::trim) {
            if !description.is_empty() {
                let _ = writeln!(out, "  Description: {}", description);
            }
        }

        write_inputs(&mut out, "Required Inputs", &entry.required_inputs);
        write_inputs(&mut out, "Optional Inputs", &entry.optional_inputs);
        if entry.required_inputs.is_empty() && entry.optional_inputs.is_empty() {
            out.push_str("  No Inputs\n");
        }

        if entry.output_types.is_empty() {
            out.push_str("  No Outputs\n");
        } else {
            out.push_str("  Outputs:\n");
            for (idx, ty) in entry.output_types.iter().enumerate() {
                match entry.output_name(idx) {
                    Some(name) => {
                        let _ = writeln!(out, "    {}: {} - '{}'", idx, ty, name);
                    }
                    None => {
                        let _ = writeln!(out, "    {}: {}", idx, ty);
                    }
                }
            }
        }
    }
    out
}

fn write_inputs(out: &mut String, heading: &str, inputs: &IndexMap<String, SocketType>) {
    if inputs.is_empty() {
        return;
    }
    let _ = writeln!(out, "  {}:", heading);
    for (name, ty) in inputs {
        let _ = writeln!(out, "    '{}': {}", name, ty);
    }
}
