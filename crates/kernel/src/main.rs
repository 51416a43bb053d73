use anyhow::Result;
use clap::Parser;
use kernel::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    kernel::init_tracing();

    let cli = Cli::parse();
    let config = cli.load_config()?;
    let entries: Vec<&str> = cli.entries.iter().map(String::as_str).collect();
    let report = kernel::build(&cli.root, &entries, &config).await?;

    for diagnostic in &report.diagnostics {
        eprintln!("warning: {}", diagnostic);
    }
    for unit in &report.units {
        println!("{} -> {}", unit.id, unit.path.display());
    }
    Ok(())
}
