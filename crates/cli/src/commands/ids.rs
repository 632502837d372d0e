//! `waymark ids` -- generate collision-resistant identifiers.

use std::error::Error;

use waymark_runtime::new_id;

use crate::OutputFormat;

pub(crate) fn run(count: usize, output: OutputFormat) -> Result<(), Box<dyn Error>> {
    let ids: Vec<String> = (0..count).map(|_| new_id()).collect();
    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string(&ids)?),
        OutputFormat::Text => {
            for id in &ids {
                println!("{}", id);
            }
        }
    }
    Ok(())
}
