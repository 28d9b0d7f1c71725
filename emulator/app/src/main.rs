/*++

Licensed under the Apache-2.0 license.

File Name:

    main.rs

Abstract:

    File contains main entrypoint for the Latte boot emulator.

--*/

use clap::Parser;
use latte_emulator::{run, EmulatorArgs};
use latte_error::STATUS_OK;

fn main() -> anyhow::Result<()> {
    let cli = EmulatorArgs::parse();
    let status = run(cli)?;
    println!("status: {:#010x}", status);
    if status != STATUS_OK {
        std::process::exit(1);
    }
    Ok(())
}
