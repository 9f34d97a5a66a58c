use anyhow::Result;

fn main() -> Result<()> {
    gvcf_denovo::cli::run()
}
