//! Limb groups and whole-body poses.
//!
//! The robot is addressed as five independent limb groups, each with a
//! fixed number of joints. Angles are in degrees throughout.

use std::fmt;
use std::ops::Index;

use crate::error::PlayerError;

/// One independently driven part of the robot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LimbGroup {
    RightArm,
    LeftArm,
    Torso,
    RightLeg,
    LeftLeg,
}

impl LimbGroup {
    /// All groups, in storage order.
    pub const ALL: [LimbGroup; 5] = [
        LimbGroup::RightArm,
        LimbGroup::LeftArm,
        LimbGroup::Torso,
        LimbGroup::RightLeg,
        LimbGroup::LeftLeg,
    ];

    /// Number of joints in this group.
    pub const fn joint_count(self) -> usize {
        match self {
            LimbGroup::RightArm | LimbGroup::LeftArm => 7,
            LimbGroup::Torso => 3,
            LimbGroup::RightLeg | LimbGroup::LeftLeg => 6,
        }
    }

    /// Remote part name used by motion drivers (e.g. `right_arm`).
    pub const fn part_name(self) -> &'static str {
        match self {
            LimbGroup::RightArm => "right_arm",
            LimbGroup::LeftArm => "left_arm",
            LimbGroup::Torso => "torso",
            LimbGroup::RightLeg => "right_leg",
            LimbGroup::LeftLeg => "left_leg",
        }
    }

    /// Position in [`LimbGroup::ALL`].
    pub const fn index(self) -> usize {
        match self {
            LimbGroup::RightArm => 0,
            LimbGroup::LeftArm => 1,
            LimbGroup::Torso => 2,
            LimbGroup::RightLeg => 3,
            LimbGroup::LeftLeg => 4,
        }
    }

    pub const fn is_leg(self) -> bool {
        matches!(self, LimbGroup::RightLeg | LimbGroup::LeftLeg)
    }
}

impl fmt::Display for LimbGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.part_name())
    }
}

/// Joint angles for every limb group at one instant.
///
/// Each group's vector always has exactly [`LimbGroup::joint_count`]
/// entries; the only way to replace one is [`BodyPose::set_group`], which
/// checks the length.
#[derive(Clone, Debug, PartialEq)]
pub struct BodyPose {
    groups: [Vec<f64>; 5],
}

impl BodyPose {
    /// A pose with every joint at 0 degrees.
    pub fn zeros() -> Self {
        Self {
            groups: LimbGroup::ALL.map(|g| vec![0.0; g.joint_count()]),
        }
    }

    pub fn group(&self, group: LimbGroup) -> &[f64] {
        &self.groups[group.index()]
    }

    pub fn group_mut(&mut self, group: LimbGroup) -> &mut [f64] {
        &mut self.groups[group.index()]
    }

    /// Replace one group's joint vector.
    ///
    /// Fails with [`PlayerError::JointCount`] if `values` has the wrong length.
    pub fn set_group(&mut self, group: LimbGroup, values: &[f64]) -> Result<(), PlayerError> {
        if values.len() != group.joint_count() {
            return Err(PlayerError::JointCount {
                group,
                expected: group.joint_count(),
                found: values.len(),
            });
        }
        self.groups[group.index()].copy_from_slice(values);
        Ok(())
    }

    /// Iterate `(group, joints)` in storage order.
    pub fn iter(&self) -> impl Iterator<Item = (LimbGroup, &[f64])> + '_ {
        LimbGroup::ALL
            .into_iter()
            .map(move |g| (g, self.groups[g.index()].as_slice()))
    }
}

impl Default for BodyPose {
    fn default() -> Self {
        Self::zeros()
    }
}

impl Index<LimbGroup> for BodyPose {
    type Output = [f64];

    fn index(&self, group: LimbGroup) -> &[f64] {
        self.group(group)
    }
}

impl fmt::Display for BodyPose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (group, joints) in self.iter() {
            write!(f, "\n  {:<10}", group.part_name())?;
            for value in joints {
                write!(f, " {:>8.2}", value)?;
            }
        }
        Ok(())
    }
}
