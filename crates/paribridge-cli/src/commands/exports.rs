//! Exports command - list the built-in foreign entry points

use anyhow::Result;
use paribridge_runtime::arena::library::EXPORTS;
use paribridge_runtime::HOST_FUNCTIONS;

pub fn run(host: bool) -> Result<()> {
    if host {
        for function in HOST_FUNCTIONS {
            let arity = if function.min_args == function.max_args {
                function.min_args.to_string()
            } else {
                format!("{}-{}", function.min_args, function.max_args)
            };
            println!("{:<16} {:>3}  {}", function.name, arity, function.summary);
        }
        return Ok(());
    }
    for export in EXPORTS {
        println!("{:<16} {:>3}", export.name, export.entry.arity().count());
    }
    Ok(())
}
