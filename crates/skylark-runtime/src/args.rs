// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Command-line options.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Physics engine backing the vehicle body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum PhysicsBackend {
    /// The built-in single-body integrator.
    #[default]
    Native,
    /// A Rapier world.
    Rapier,
}

/// Headless Skylark runtime: serial controller in, fixed-tick vehicle simulation out.
#[derive(Debug, Clone, PartialEq, Parser)]
#[command(name = "skylark-runtime", version, about)]
pub struct Options {
    /// RON configuration file. Defaults are used when omitted.
    pub config: Option<PathBuf>,
    /// Stop after this many fixed ticks. Without it the run ends when the link stops.
    #[arg(long)]
    pub ticks: Option<u64>,
    /// Feed the link from a synthetic controller instead of a serial port.
    #[arg(long)]
    pub virtual_controller: bool,
    #[arg(long, value_enum, default_value_t = PhysicsBackend::Native)]
    pub physics: PhysicsBackend,
    /// Run ticks as fast as possible instead of pacing them to wall-clock time.
    #[arg(long)]
    pub no_realtime: bool,
    /// Apply standard gravity to the vehicle body.
    #[arg(long)]
    pub gravity: bool,
}

impl Options {
    /// `true` when ticks are paced to wall-clock time.
    pub fn realtime(&self) -> bool {
        !self.no_realtime
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Options, clap::Error> {
        Options::try_parse_from(std::iter::once("skylark-runtime").chain(args.iter().copied()))
    }

    #[test]
    fn test_defaults() {
        let options = parse(&[]).unwrap();
        assert_eq!(options.config, None);
        assert_eq!(options.ticks, None);
        assert!(options.realtime());
        assert!(!options.gravity);
        assert_eq!(options.physics, PhysicsBackend::Native);
    }

    #[test]
    fn test_full_command_line() {
        let options = parse(&[
            "rocket.ron",
            "--ticks",
            "250",
            "--virtual-controller",
            "--physics",
            "rapier",
            "--no-realtime",
            "--gravity",
        ])
        .unwrap();
        assert_eq!(options.config, Some(PathBuf::from("rocket.ron")));
        assert_eq!(options.ticks, Some(250));
        assert!(options.virtual_controller);
        assert!(!options.realtime());
        assert!(options.gravity);
        assert_eq!(options.physics, PhysicsBackend::Rapier);
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(parse(&["--ticks"]).is_err());
        assert!(parse(&["--ticks", "many"]).is_err());
        assert!(parse(&["--physics", "bullet"]).is_err());
        assert!(parse(&["--fast"]).is_err());
        assert!(parse(&["a.ron", "b.ron"]).is_err());
    }

    #[test]
    fn test_command_definition_is_consistent() {
        use clap::CommandFactory;
        Options::command().debug_assert();
    }
}
