//! Motion-driver abstraction and scoped limb handles.
//!
//! A [`MotionDriver`] opens one [`LimbHandle`] per limb group. Handles are
//! never used bare: [`LimbChannel`] wraps each one and closes it when
//! dropped, and [`LimbRig`] owns the five channels of a session, so every
//! exit path (finish, decline, error, interrupt) releases every handle that
//! was opened.
//!
//! # Example
//!
//! ```no_run
//! use body_player::config::RetryPolicy;
//! use body_player::driver::LimbRig;
//! use body_player::limb::LimbGroup;
//! use body_player::sim_driver::SimulatedRobot;
//!
//! # async fn example() -> Result<(), body_player::PlayerError> {
//! let robot = SimulatedRobot::new("icubGazeboSim");
//! let mut driver = robot.driver();
//! let mut rig = LimbRig::open(&mut driver)?;
//! let baseline = rig.read_baseline(&RetryPolicy::default()).await?;
//! println!("torso at {:?}", &baseline[LimbGroup::Torso]);
//! // dropping `rig` closes all five handles
//! # Ok(())
//! # }
//! ```

use crate::config::{MotionProfile, RetryPolicy};
use crate::error::{DriverError, EncoderReadError, PlayerError};
use crate::limb::{BodyPose, LimbGroup};

/// Factory for per-limb-group handles.
pub trait MotionDriver: Send {
    type Handle: LimbHandle;

    /// Connect to the remote part that drives `group`.
    fn open(&mut self, group: LimbGroup) -> Result<Self::Handle, DriverError>;
}

/// An open connection to one limb group.
pub trait LimbHandle: Send {
    /// Number of joints the device reports.
    fn joint_count(&self) -> usize;

    /// Read the current joint angles. Failures are transient and may be retried.
    fn get_encoders(&mut self) -> Result<Vec<f64>, EncoderReadError>;

    /// Apply reference speed/acceleration and switch to position control.
    fn configure(&mut self, profile: &MotionProfile) -> Result<(), DriverError>;

    /// Command a position move. Returns once the command is accepted; the
    /// move itself is not awaited.
    fn position_move(&mut self, joints: &[f64]) -> Result<(), DriverError>;

    /// Release the connection. Called exactly once, by [`LimbChannel`]'s drop.
    fn close(&mut self);
}

/// A limb handle that is closed when dropped.
pub struct LimbChannel<H: LimbHandle> {
    group: LimbGroup,
    handle: H,
}

impl<H: LimbHandle> LimbChannel<H> {
    /// Open `group` and check its joint count.
    pub fn open<D>(driver: &mut D, group: LimbGroup) -> Result<Self, PlayerError>
    where
        D: MotionDriver<Handle = H>,
    {
        tracing::debug!("{}: opening driver", group);
        let handle = driver
            .open(group)
            .map_err(|e| PlayerError::driver(group, e))?;
        // guard first, so a bad joint count still closes the handle
        let channel = Self { group, handle };
        let found = channel.handle.joint_count();
        if found != group.joint_count() {
            return Err(PlayerError::JointCount {
                group,
                expected: group.joint_count(),
                found,
            });
        }
        Ok(channel)
    }

    pub fn group(&self) -> LimbGroup {
        self.group
    }

    /// Read encoders, retrying transient failures with backoff.
    ///
    /// Fails with [`PlayerError::EncoderTimeout`] once `policy.max_attempts`
    /// reads have failed.
    pub async fn read_encoders(&mut self, policy: &RetryPolicy) -> Result<Vec<f64>, PlayerError> {
        let max_attempts = policy.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.handle.get_encoders() {
                Ok(values) => {
                    if values.len() != self.group.joint_count() {
                        return Err(PlayerError::JointCount {
                            group: self.group,
                            expected: self.group.joint_count(),
                            found: values.len(),
                        });
                    }
                    return Ok(values);
                }
                Err(e) if attempt >= max_attempts => {
                    return Err(PlayerError::EncoderTimeout {
                        group: self.group,
                        attempts: attempt,
                        last: e,
                    });
                }
                Err(e) => {
                    let delay = policy.backoff(attempt);
                    tracing::debug!(
                        "{}: {} (attempt {}/{}), retrying in {:?}",
                        self.group,
                        e,
                        attempt,
                        max_attempts,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    pub fn configure(&mut self, profile: &MotionProfile) -> Result<(), PlayerError> {
        self.handle
            .configure(profile)
            .map_err(|e| PlayerError::driver(self.group, e))
    }

    pub fn position_move(&mut self, joints: &[f64]) -> Result<(), PlayerError> {
        self.handle
            .position_move(joints)
            .map_err(|e| PlayerError::driver(self.group, e))
    }
}

impl<H: LimbHandle> Drop for LimbChannel<H> {
    fn drop(&mut self) {
        self.handle.close();
        tracing::debug!("{}: driver closed", self.group);
    }
}

/// The five limb channels of one session, in [`LimbGroup::ALL`] order.
pub struct LimbRig<H: LimbHandle> {
    channels: Vec<LimbChannel<H>>,
}

impl<H: LimbHandle> LimbRig<H> {
    /// Open every limb group. If one fails, the ones already open are closed.
    pub fn open<D>(driver: &mut D) -> Result<Self, PlayerError>
    where
        D: MotionDriver<Handle = H>,
    {
        let mut channels = Vec::with_capacity(LimbGroup::ALL.len());
        for group in LimbGroup::ALL {
            channels.push(LimbChannel::open(driver, group)?);
        }
        Ok(Self { channels })
    }

    pub fn channel_mut(&mut self, group: LimbGroup) -> &mut LimbChannel<H> {
        &mut self.channels[group.index()]
    }

    /// Read every group's encoders into one pose.
    pub async fn read_baseline(&mut self, policy: &RetryPolicy) -> Result<BodyPose, PlayerError> {
        let mut pose = BodyPose::zeros();
        for channel in self.channels.iter_mut() {
            let values = channel.read_encoders(policy).await?;
            pose.set_group(channel.group(), &values)?;
        }
        Ok(pose)
    }

    /// Configure every group with `profile`.
    pub fn configure(&mut self, profile: &MotionProfile) -> Result<(), PlayerError> {
        self.channels
            .iter_mut()
            .try_for_each(|channel| channel.configure(profile))
    }

    /// Send `pose`'s joints for each of `groups`, in the given order.
    pub fn dispatch(&mut self, pose: &BodyPose, groups: &[LimbGroup]) -> Result<(), PlayerError> {
        for &group in groups {
            self.channel_mut(group).position_move(pose.group(group))?;
        }
        Ok(())
    }
}
