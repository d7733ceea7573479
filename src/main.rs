// SPDX-License-Identifier: Apache-2.0

//! Workstation service launcher.
//!
//! One binary, one subcommand per service. Each service builds its
//! configuration from the environment, attaches to the bus, and runs until
//! stopped; a non-zero exit code asks the orchestrator to restart it.

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use wxz_bus::Bus;
use wxz_config::{ArmControlConfig, BtServiceConfig, env_str};

#[derive(Parser)]
#[command(name = "workstation", about = "Robotic workstation control plane")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the arm-control service (SDK mediation).
    ArmControl,
    /// Run the behavior-tree service (orchestration).
    BtService,
}

fn init_tracing() {
    let level = env_str("WXZ_LOG_LEVEL", "info");
    let filter = EnvFilter::try_new(&level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    let bus = Bus::new();
    let exit_code = match cli.command {
        Command::ArmControl => wxz_arm_control::app::run(bus, ArmControlConfig::load()),
        Command::BtService => wxz_bt_service::app::run(bus, BtServiceConfig::load()),
    };
    std::process::exit(exit_code);
}
