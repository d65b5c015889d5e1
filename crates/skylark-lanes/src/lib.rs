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

//! # Skylark Lanes
//!
//! Hot-path code executed once per fixed simulation tick: brake drag and its momentum bound,
//! thrust, servo gimbals, mass and inertia synthesis, control mapping and the vehicle that ties
//! them together. Nothing in here blocks or performs I/O.

#![warn(missing_docs)]

pub mod actuator_lane;
pub mod control_lane;
pub mod mass_lane;
pub mod physics_lane;
pub mod vehicle_lane;

pub use actuator_lane::{BrakeEnsembleLane, BrakeUnit, Servo, Thruster};
pub use control_lane::{ControlCommand, ControlMapper};
pub use mass_lane::{MassInertiaBuilder, MassPart};
pub use physics_lane::NativeRigidBody;
pub use vehicle_lane::{AssemblyError, Vehicle, VehicleAssembly};
