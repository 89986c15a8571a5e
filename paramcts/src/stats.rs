//! `--stats`/`--dot` mode: loads a checkpoint and prints a human-readable
//! summary instead of resuming the search, grounded on
//! `original_source/src/paramMCTS.py::stats`.

use std::path::Path;

pub fn run(save_path: &Path, dot_path: Option<&Path>) -> anyhow::Result<()> {
    let payload = paramcts_checkpoint::load(save_path)?;
    let (tree, fields) = paramcts_checkpoint::apply_as_master(payload);

    let mut names: Vec<_> = paramcts_types::all().into_iter().map(|p| p.name().to_string()).collect();
    names.sort();

    println!("instance variable : {}", fields.instance_variable);
    println!("per-run timeout    : {}s", fields.timeout_seconds);
    println!("parameters ({})    : {}", names.len(), names.join(", "));
    println!("tree nodes         : {}", tree.node_count());
    println!("best assignment    : {}", tree.best_assignment());

    if let Some(dot_path) = dot_path {
        std::fs::write(dot_path, paramcts_tree::to_dot(&tree))?;
        println!("dot graph written  : {}", dot_path.display());
    }
    Ok(())
}
