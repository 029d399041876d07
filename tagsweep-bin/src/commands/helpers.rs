use anyhow::{Context, Result};
use std::fs;
use std::io::{self, Write};
use std::path::Path;

// Helper function to create an output writer.
//
// If the output file is not specified, it will use `stdout`.
// An existing output file is truncated.
//
// # Errors
//
// If the output file cannot be created, an error is returned.
pub(crate) fn create_writer(output: Option<&Path>) -> Result<Box<dyn Write>> {
    let out = if let Some(output) = output {
        let out = fs::File::create(output)
            .with_context(|| format!("Cannot create output file `{}`", output.display()))?;
        Box::new(out) as Box<dyn Write>
    } else {
        let out = io::stdout();
        Box::new(out.lock()) as Box<dyn Write>
    };
    Ok(out)
}
