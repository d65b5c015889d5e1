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

//! # Skylark Core
//!
//! Foundational crate containing math primitives, the rigid-body contract consumed by the
//! actuator lanes, the telemetry frame shared between the serial link and the tick domain,
//! and the simulation configuration tree.

#![warn(missing_docs)]

pub mod config;
pub mod math;
pub mod physics;
pub mod telemetry;

pub use config::SimulationConfig;
pub use physics::{MassProperties, Pose, RigidBodyProvider};
pub use telemetry::SensorFrame;
