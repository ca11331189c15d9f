use clap::Parser;
use std::fs;
use std::time::Instant;
use widget_inputs::prelude::*;
use widget_inputs::widget::visibility::serialize_value;

/// Loads a workflow against node metadata and reports how its widgets and primitives resolve
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the node metadata (`object_info`) JSON file
    object_info_path: String,
    /// Path to the workflow JSON file
    workflow_path: String,

    /// Print the executable prompt after loading
    #[arg(short, long)]
    prompt: bool,

    /// Write the re-serialized workflow to this path
    #[arg(short, long)]
    save: Option<String>,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    let total_start = Instant::now();

    // --- 1. File Loading ---
    let object_info = fs::read_to_string(&cli.object_info_path).unwrap_or_else(|e| {
        exit_with_error(&format!(
            "Failed to read node metadata '{}': {}",
            &cli.object_info_path, e
        ))
    });
    let workflow = fs::read_to_string(&cli.workflow_path).unwrap_or_else(|e| {
        exit_with_error(&format!(
            "Failed to read workflow '{}': {}",
            &cli.workflow_path, e
        ))
    });

    // --- 2. Parsing ---
    let catalog = NodeCatalog::from_json(&object_info)
        .unwrap_or_else(|e| exit_with_error(&format!("Failed to parse node metadata: {}", e)));
    let document = GraphDocument::from_json(&workflow)
        .unwrap_or_else(|e| exit_with_error(&format!("Failed to parse workflow: {}", e)));

    // --- 3. Load ---
    let mut editor = Editor::new(catalog);
    editor
        .load(&document)
        .unwrap_or_else(|e| exit_with_error(&format!("Failed to load workflow: {}", e)));
    let load_duration = total_start.elapsed();

    // --- 4. Summary ---
    println!("\n--- Nodes ---");
    for node_id in editor.graph().node_ids() {
        if let Some(node) = editor.node(node_id) {
            print_node(node);
        }
    }

    if cli.prompt {
        let prompt = editor.graph_to_prompt();
        let json = serde_json::to_string_pretty(&prompt)
            .unwrap_or_else(|e| exit_with_error(&format!("Failed to serialize prompt: {}", e)));
        println!("\n--- Prompt ---\n{}", json);
    }

    if let Some(path) = &cli.save {
        let json = editor
            .save()
            .to_json_pretty()
            .unwrap_or_else(|e| exit_with_error(&format!("Failed to serialize workflow: {}", e)));
        fs::write(path, json)
            .unwrap_or_else(|e| exit_with_error(&format!("Failed to write '{}': {}", path, e)));
        println!("\nSaved workflow to '{}'", path);
    }

    println!("\n-----------------------------");
    println!("Nodes:                {}", editor.graph().node_count());
    println!("Links:                {}", editor.graph().link_ids().len());
    println!("Load:                 {:?}", load_duration);
    println!("Total Execution:      {:?}", total_start.elapsed());
}

fn print_node(node: &Node) {
    let role = match node.primitive_state() {
        Some(state) => match state.effective_config() {
            Some(config) => format!("primitive, bound to {}", config.ty),
            None => "primitive, empty".to_string(),
        },
        None if node.is_relay() => "relay".to_string(),
        None => node.type_name.clone(),
    };
    println!("#{} '{}' ({})", node.id, node.title, role);

    for widget in &node.widgets {
        let state = if widget.is_hidden() { "input" } else { "widget" };
        let serialized = serialize_value(node, widget)
            .map_or_else(|| "-".to_string(), |v| v.to_string());
        println!(
            "    {:<24} {:<8} {:<18} value={} serialized={}",
            widget.name, state, widget.kind, widget.value, serialized
        );
    }
}

fn exit_with_error(message: &str) -> ! {
    eprintln!("\nError: {}", message);
    std::process::exit(1);
}
