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

//! Actuator Lane
//!
//! Force models for the parts mounted on the vehicle body.

mod brake;
mod brake_ensemble;
mod servo;
mod thruster;

pub use brake::*;
pub use brake_ensemble::*;
pub use servo::*;
pub use thruster::*;

use skylark_core::math::Vec3;

/// A force together with the world point it acts on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AppliedForce {
    /// Force vector in world space (N).
    pub force: Vec3,
    /// World-space application point.
    pub point: Vec3,
}
