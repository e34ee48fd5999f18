use hopper_mcp::{ToolCategory, ToolInfo, TOOL_REGISTRY};
use std::collections::HashMap;
use std::fmt::Write as _;

fn category_title(cat: ToolCategory) -> &'static str {
    match cat {
        ToolCategory::Core => "Core",
        ToolCategory::Documents => "Documents",
        ToolCategory::Segments => "Segments",
        ToolCategory::Search => "Search",
        ToolCategory::Analysis => "Analysis",
        ToolCategory::ControlFlow => "Control Flow",
        ToolCategory::Annotations => "Annotations",
        ToolCategory::Cache => "String Cache",
    }
}

/// Tools in these categories save the current document on success.
fn saves_document(cat: ToolCategory) -> bool {
    matches!(cat, ToolCategory::Annotations)
}

fn main() {
    let mut groups: HashMap<ToolCategory, Vec<&ToolInfo>> = HashMap::new();
    for tool in TOOL_REGISTRY {
        groups.entry(tool.category).or_default().push(tool);
    }
    for tools in groups.values_mut() {
        tools.sort_by_key(|t| t.name);
    }

    let tool_count = TOOL_REGISTRY.len();

    let mut out = String::new();
    let _ = writeln!(out, "# Tools\n");
    let _ = writeln!(
        out,
        "> Auto-generated from `src/tool_registry.rs`. Do not edit by hand."
    );
    let _ = writeln!(
        out,
        "> Regenerate with: `cargo run --bin gen_tools_doc -- docs/TOOLS.md`.\n"
    );

    let _ = writeln!(out, "## Discovery Workflow\n");
    let _ = writeln!(
        out,
        "- `tools/list` returns the full tool set (currently {tool_count} tools)"
    );
    let _ = writeln!(
        out,
        "- `tool_catalog(query=...)` searches all tools by intent"
    );
    let _ = writeln!(
        out,
        "- `tool_help(name=...)` returns full documentation and schema"
    );
    let _ = writeln!(
        out,
        "- Every analysis tool acts on the current document (`get_current_document`, `set_current_document`)"
    );
    let _ = writeln!(out);

    for &cat in ToolCategory::all() {
        let Some(tools) = groups.get(&cat) else {
            continue;
        };
        let _ = writeln!(out, "## {} (`{}`)\n", category_title(cat), cat.as_str());
        let _ = writeln!(out, "{}", cat.description());
        if saves_document(cat) {
            let _ = writeln!(
                out,
                "Changes are saved to the document when Hopper accepts them."
            );
        }
        let _ = writeln!(out, "\n| Tool | Description |");
        let _ = writeln!(out, "|------|-------------|");
        for tool in tools {
            let _ = writeln!(out, "| `{}` | {} |", tool.name, tool.short_desc);
        }
        let _ = writeln!(out);
    }

    let _ = writeln!(out, "## Notes\n");
    let _ = writeln!(
        out,
        "- `get_address_info` accepts a single value, an array, or a comma-separated string (`\"0x1000, _main\"`)"
    );
    let _ = writeln!(
        out,
        "- Addresses are hex with a `0x` prefix; anything else is looked up as a name"
    );
    let _ = writeln!(
        out,
        "- String tools read `<database>.mcpcache` next to the saved document; run `cache_strings` once per document"
    );

    let args: Vec<String> = std::env::args().collect();
    if args.len() > 1 {
        if let Err(err) = std::fs::write(&args[1], out) {
            eprintln!("failed to write {}: {}", args[1], err);
            std::process::exit(1);
        }
    } else {
        print!("{out}");
    }
}
