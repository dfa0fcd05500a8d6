//! `pla-compose merge`: run the merge kernel on two PLA files.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use pla_compose::function::{merge, pla};

#[derive(Args)]
pub struct MergeArgs {
    /// PLA file of the parent function
    parent: PathBuf,

    /// PLA file of the function substituted in
    son: PathBuf,

    /// Input position of the parent that the son replaces
    #[arg(long, short)]
    position: usize,
}

impl MergeArgs {
    pub fn execute(self) -> Result<()> {
        let parent = pla::load(&self.parent)?;
        let son = pla::load(&self.son)?;
        let merged = merge(&parent, &son, self.position).with_context(|| {
            format!(
                "Cannot merge {} into input {} of {}",
                self.son.display(),
                self.position,
                self.parent.display()
            )
        })?;

        println!(".i {}", merged.var_count());
        println!(".o 1");
        println!(".p {}", merged.len());
        for row in merged.rows() {
            println!("{} {}", row.inputs_text(), u8::from(row.output));
        }
        println!(".e");
        Ok(())
    }
}
