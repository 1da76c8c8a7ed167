//! Diagnostics command -- displays container engine connectivity information

use anyhow::Result;
use bollard::Docker;

use crate::config::Configuration;

pub async fn run(config: &Configuration) -> Result<()> {
    println!("Task Commander Diagnostics");
    println!("==========================\n");

    println!("Configuration:");
    println!("  root: {}", config.system.root_directory.display());
    println!("  out:  {}", config.system.out_directory.display());
    println!("  tmp:  {}", config.system.tmp_directory.display());
    println!("  socket: {}", config.docker.socket);

    println!("\nContainer engine:");
    match Docker::connect_with_socket(&config.docker.socket, 120, bollard::API_DEFAULT_VERSION) {
        Ok(docker) => match docker.version().await {
            Ok(version) => {
                println!("  version: {}", version.version.unwrap_or_default());
                println!("  api version: {}", version.api_version.unwrap_or_default());
            }
            Err(e) => println!("  error getting version: {}", e),
        },
        Err(e) => println!("  error connecting: {}", e),
    }

    let registered = crate::task::Registry::global().names();
    println!("\nRegistered tasks ({}):", registered.len());
    let mut names = registered;
    names.sort_unstable();
    for name in names {
        println!("  {}", name);
    }

    Ok(())
}
