//! Static joint-limit envelope.
//!
//! Every pose is clamped against a fixed per-joint `[min, max]` table
//! before it is sent to a driver. Out-of-range joints are clamped to the
//! violated bound and counted; a violation never stops a session.

use crate::limb::{BodyPose, LimbGroup};

/// Angular bounds of one joint, in degrees.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct JointBounds {
    pub min: f64,
    pub max: f64,
}

const fn b(min: f64, max: f64) -> JointBounds {
    JointBounds { min, max }
}

/// Bounds shared by both arms.
pub const ARM_BOUNDS: [JointBounds; 7] = [
    b(-85.0, 6.0),
    b(15.0, 80.0),
    b(-15.0, 78.0),
    b(15.0, 85.0),
    b(-70.0, 60.0),
    b(-70.0, 0.0),
    b(-10.0, 30.0),
];

pub const TORSO_BOUNDS: [JointBounds; 3] = [b(-25.0, 25.0), b(-8.0, 8.0), b(-10.0, 20.0)];

/// Bounds shared by both legs.
pub const LEG_BOUNDS: [JointBounds; 6] = [
    b(-30.0, 85.0),
    b(0.0, 80.0),
    b(-70.0, 70.0),
    b(-99.0, 0.0),
    b(-30.0, 30.0),
    b(-20.0, 20.0),
];

/// Which side of a joint's range was exceeded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoundSide {
    Max,
    Min,
}

/// One clamped joint.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Violation {
    pub group: LimbGroup,
    pub joint: usize,
    /// Value before clamping.
    pub commanded: f64,
    /// Value applied instead.
    pub bound: f64,
    pub side: BoundSide,
}

/// Every violation found by one full-body clamp.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ClampReport {
    pub violations: Vec<Violation>,
}

impl ClampReport {
    pub fn count(&self) -> usize {
        self.violations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn count_for(&self, group: LimbGroup) -> usize {
        self.violations.iter().filter(|v| v.group == group).count()
    }
}

/// Per-limb-group bound tables and the clamp operation over them.
#[derive(Clone, Debug)]
pub struct SafetyEnvelope {
    tables: [&'static [JointBounds]; 5],
}

impl SafetyEnvelope {
    /// The fixed robot envelope.
    pub fn standard() -> Self {
        Self {
            tables: LimbGroup::ALL.map(|g| -> &'static [JointBounds] {
                match g {
                    LimbGroup::RightArm | LimbGroup::LeftArm => &ARM_BOUNDS,
                    LimbGroup::Torso => &TORSO_BOUNDS,
                    LimbGroup::RightLeg | LimbGroup::LeftLeg => &LEG_BOUNDS,
                }
            }),
        }
    }

    pub fn bounds(&self, group: LimbGroup) -> &[JointBounds] {
        self.tables[group.index()]
    }

    /// Clamp one group's joint vector.
    ///
    /// Returns the clamped vector and the number of joints that were out of
    /// range. `joints` is expected to hold `group.joint_count()` values.
    pub fn clamp(&self, group: LimbGroup, joints: &[f64]) -> (Vec<f64>, usize) {
        let mut out = joints.to_vec();
        let mut report = ClampReport::default();
        self.clamp_group(group, &mut out, &mut report);
        (out, report.count())
    }

    /// Clamp every limb group of `pose`.
    pub fn clamp_body(&self, pose: &BodyPose) -> (BodyPose, ClampReport) {
        let mut out = pose.clone();
        let mut report = ClampReport::default();
        for group in LimbGroup::ALL {
            self.clamp_group(group, out.group_mut(group), &mut report);
        }
        (out, report)
    }

    fn clamp_group(&self, group: LimbGroup, joints: &mut [f64], report: &mut ClampReport) {
        for (joint, (value, bounds)) in joints.iter_mut().zip(self.bounds(group)).enumerate() {
            let commanded = *value;
            let side = if commanded > bounds.max {
                BoundSide::Max
            } else if commanded < bounds.min || commanded.is_nan() {
                // NaN compares false both ways; treat it as below range
                BoundSide::Min
            } else {
                continue;
            };
            let bound = match side {
                BoundSide::Max => bounds.max,
                BoundSide::Min => bounds.min,
            };
            *value = bound;
            report.violations.push(Violation {
                group,
                joint,
                commanded,
                bound,
                side,
            });
        }
    }
}

impl Default for SafetyEnvelope {
    fn default() -> Self {
        Self::standard()
    }
}
