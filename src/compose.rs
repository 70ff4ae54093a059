//! Composition of recordings onto a measured baseline pose.
//!
//! A human recording only covers a few anatomical joints. Composition
//! starts every tick from the baseline (the robot's encoders at session
//! start) and overwrites the mapped joints, identically on both sides:
//!
//! | channel          | joint       |
//! |------------------|-------------|
//! | `torso_pitch`    | torso\[2\]  |
//! | `shoulder_pitch` | arm\[0\]    |
//! | `elbow`          | arm\[3\]    |
//! | `hip_pitch`      | leg\[0\]    |
//! | `knee`           | leg\[3\]    |
//! | `ankle_pitch`    | leg\[4\]    |
//!
//! `shoulder_roll`, `shoulder_yaw` and `hip_roll` are loaded but never
//! mapped; those joints stay at the baseline.

use crate::error::PlayerError;
use crate::limb::{BodyPose, LimbGroup};
use crate::trajectory::{HumanSample, ReducedHumanTrajectory, Trajectory};

const TORSO_PITCH: usize = 2;
const SHOULDER_PITCH: usize = 0;
const ELBOW: usize = 3;
const HIP_PITCH: usize = 0;
const KNEE: usize = 3;
const ANKLE_PITCH: usize = 4;

/// Overwrite the mapped joints of one group's vector with `sample`.
fn apply_sample(group: LimbGroup, joints: &mut [f64], sample: &HumanSample) {
    match group {
        LimbGroup::Torso => {
            joints[TORSO_PITCH] = sample.torso_pitch;
        }
        LimbGroup::RightArm | LimbGroup::LeftArm => {
            joints[SHOULDER_PITCH] = sample.shoulder_pitch;
            joints[ELBOW] = sample.elbow;
        }
        LimbGroup::RightLeg | LimbGroup::LeftLeg => {
            joints[HIP_PITCH] = sample.hip_pitch;
            joints[KNEE] = sample.knee;
            joints[ANKLE_PITCH] = sample.ankle_pitch;
        }
    }
}

/// Whether `joint` of `group` is driven by the human recording.
pub fn is_mapped(group: LimbGroup, joint: usize) -> bool {
    match group {
        LimbGroup::Torso => joint == TORSO_PITCH,
        LimbGroup::RightArm | LimbGroup::LeftArm => joint == SHOULDER_PITCH || joint == ELBOW,
        LimbGroup::RightLeg | LimbGroup::LeftLeg => {
            joint == HIP_PITCH || joint == KNEE || joint == ANKLE_PITCH
        }
    }
}

/// `baseline` with the mapped joints taken from tick 0 of `reduced`.
pub fn compose_starting_pose(
    reduced: &ReducedHumanTrajectory,
    baseline: &BodyPose,
) -> Result<BodyPose, PlayerError> {
    let sample = reduced.sample(0).ok_or(PlayerError::EmptyTrajectory)?;
    let mut pose = baseline.clone();
    for group in LimbGroup::ALL {
        apply_sample(group, pose.group_mut(group), &sample);
    }
    Ok(pose)
}

/// One whole-body pose per tick of `reduced`, each built from `baseline`
/// with the mapped joints overwritten by that tick's sample.
pub fn compose_full_trajectory(
    reduced: &ReducedHumanTrajectory,
    baseline: &BodyPose,
) -> Result<Trajectory, PlayerError> {
    if reduced.is_empty() {
        return Err(PlayerError::EmptyTrajectory);
    }
    let mut trajectory = Trajectory::filled(reduced.tick_count(), baseline);
    for t in 0..reduced.tick_count() {
        let Some(sample) = reduced.sample(t) else {
            break;
        };
        for group in LimbGroup::ALL {
            apply_sample(group, trajectory.series_mut(group).row_mut(t), &sample);
        }
    }
    Ok(trajectory)
}

/// Replay a robot-space recording: groups the file recorded are copied as
/// is, groups it did not record hold `baseline` at every tick.
pub fn compose_recorded_trajectory(
    full: &Trajectory,
    baseline: &BodyPose,
) -> Result<Trajectory, PlayerError> {
    if full.is_empty() {
        return Err(PlayerError::EmptyTrajectory);
    }
    let mut trajectory = Trajectory::filled(full.tick_count(), baseline);
    for group in LimbGroup::ALL.into_iter().filter(|&g| full.is_recorded(g)) {
        *trajectory.series_mut(group) = full.series(group).clone();
    }
    Ok(trajectory)
}
