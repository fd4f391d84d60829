//! Text rendering of the scope catalog for `list-scopes`.

use std::fmt::Write;

use keyscope_core::Catalog;

pub const EMPTY_WARNING: &str =
    "No scopes found. Make sure your operations are listed in the manifest.";

/// Render `catalog` grouped by module, then resource.
pub fn render(catalog: &Catalog) -> String {
    if catalog.is_empty() {
        return format!("{EMPTY_WARNING}\n");
    }

    let mut out = String::from("Available API Scopes:\n");
    for module in catalog.grouped_by_declared_module() {
        let _ = writeln!(out, "\n[{}]", module.module);
        for resource in &module.resources {
            let _ = writeln!(out, "{}:", resource.resource);
            for choice in &resource.scopes {
                let _ = writeln!(out, "  - {}  ({})", choice.scope, choice.label);
            }
        }
    }

    let _ = writeln!(
        out,
        "\nTotal: {} resources, {} scopes",
        catalog.resource_count(),
        catalog.scope_count()
    );
    out
}
