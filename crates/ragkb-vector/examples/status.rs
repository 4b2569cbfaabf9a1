use std::path::PathBuf;

use ragkb_vector::IndexStore;

fn main() -> anyhow::Result<()> {
    let path = std::env::args().nth(1).map(PathBuf::from).unwrap_or_else(|| PathBuf::from("vectorstore/index.json"));
    let store = IndexStore::new(path);
    let stats = store.stats()?;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}
