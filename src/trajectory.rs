//! Recorded trajectories and the loaders that read them.
//!
//! Two text formats are supported, both one line per tick with
//! whitespace-separated floating-point fields:
//!
//! ```text
//! full (robot-space) recording:
//!   [7 floating-base fields] [17 joint angles, see FULL_COLUMNS]
//!
//! reduced (human) recording:
//!   [counter] hip_pitch hip_roll knee ankle_pitch shoulder_pitch
//!             shoulder_roll shoulder_yaw elbow torso_pitch
//! ```
//!
//! Loading is two-pass: the file is scanned once to count ticks, then the
//! sequences are allocated at their final size and filled by a second pass.
//! Any missing or malformed field fails the whole load with a
//! [`PlayerError::Parse`] naming the line and column.

use std::fs::File;
use std::io::{BufRead, BufReader, Seek};
use std::path::Path;

use crate::error::PlayerError;
use crate::limb::{BodyPose, LimbGroup};

/// A tick × joint matrix for one limb group, stored row-major.
#[derive(Clone, Debug, PartialEq)]
pub struct JointSeries {
    joints: usize,
    samples: Vec<f64>,
}

impl JointSeries {
    /// A zero-filled series.
    pub fn zeros(ticks: usize, joints: usize) -> Self {
        Self {
            joints,
            samples: vec![0.0; ticks * joints],
        }
    }

    pub fn ticks(&self) -> usize {
        if self.joints == 0 {
            0
        } else {
            self.samples.len() / self.joints
        }
    }

    pub fn joints(&self) -> usize {
        self.joints
    }

    /// Joint vector at tick `t`.
    ///
    /// # Panics
    /// If `t >= self.ticks()`.
    pub fn row(&self, t: usize) -> &[f64] {
        &self.samples[t * self.joints..(t + 1) * self.joints]
    }

    pub(crate) fn row_mut(&mut self, t: usize) -> &mut [f64] {
        &mut self.samples[t * self.joints..(t + 1) * self.joints]
    }
}

/// A whole-body trajectory: one [`JointSeries`] per limb group, all with the
/// same tick count.
#[derive(Clone, Debug, PartialEq)]
pub struct Trajectory {
    tick_count: usize,
    series: [JointSeries; 5],
    recorded: [bool; 5],
}

impl Trajectory {
    /// A trajectory holding `pose` at every tick.
    pub fn filled(tick_count: usize, pose: &BodyPose) -> Self {
        let series = LimbGroup::ALL.map(|g| {
            let mut s = JointSeries::zeros(tick_count, g.joint_count());
            for t in 0..tick_count {
                s.row_mut(t).copy_from_slice(pose.group(g));
            }
            s
        });
        Self {
            tick_count,
            series,
            recorded: [true; 5],
        }
    }

    fn zeros(tick_count: usize) -> Self {
        Self {
            tick_count,
            series: LimbGroup::ALL.map(|g| JointSeries::zeros(tick_count, g.joint_count())),
            recorded: [true; 5],
        }
    }

    pub fn tick_count(&self) -> usize {
        self.tick_count
    }

    pub fn is_empty(&self) -> bool {
        self.tick_count == 0
    }

    pub fn series(&self, group: LimbGroup) -> &JointSeries {
        &self.series[group.index()]
    }

    pub(crate) fn series_mut(&mut self, group: LimbGroup) -> &mut JointSeries {
        &mut self.series[group.index()]
    }

    /// Whether the source file carried columns for `group`.
    ///
    /// Full recordings have no leg columns; their leg series are zero.
    pub fn is_recorded(&self, group: LimbGroup) -> bool {
        self.recorded[group.index()]
    }

    /// The whole-body pose at tick `t`, or `None` past the end.
    pub fn pose_at(&self, t: usize) -> Option<BodyPose> {
        if t >= self.tick_count {
            return None;
        }
        let mut pose = BodyPose::zeros();
        for group in LimbGroup::ALL {
            pose.group_mut(group).copy_from_slice(self.series(group).row(t));
        }
        Some(pose)
    }
}

/// The nine channels of a reduced human recording, in file order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HumanChannel {
    HipPitch,
    HipRoll,
    Knee,
    AnklePitch,
    ShoulderPitch,
    ShoulderRoll,
    ShoulderYaw,
    Elbow,
    TorsoPitch,
}

impl HumanChannel {
    /// All channels in file column order.
    pub const ALL: [HumanChannel; 9] = [
        HumanChannel::HipPitch,
        HumanChannel::HipRoll,
        HumanChannel::Knee,
        HumanChannel::AnklePitch,
        HumanChannel::ShoulderPitch,
        HumanChannel::ShoulderRoll,
        HumanChannel::ShoulderYaw,
        HumanChannel::Elbow,
        HumanChannel::TorsoPitch,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            HumanChannel::HipPitch => "hip_pitch",
            HumanChannel::HipRoll => "hip_roll",
            HumanChannel::Knee => "knee",
            HumanChannel::AnklePitch => "ankle_pitch",
            HumanChannel::ShoulderPitch => "shoulder_pitch",
            HumanChannel::ShoulderRoll => "shoulder_roll",
            HumanChannel::ShoulderYaw => "shoulder_yaw",
            HumanChannel::Elbow => "elbow",
            HumanChannel::TorsoPitch => "torso_pitch",
        }
    }

    const fn index(self) -> usize {
        self as usize
    }
}

/// One tick of a reduced human recording.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct HumanSample {
    pub hip_pitch: f64,
    pub hip_roll: f64,
    pub knee: f64,
    pub ankle_pitch: f64,
    pub shoulder_pitch: f64,
    pub shoulder_roll: f64,
    pub shoulder_yaw: f64,
    pub elbow: f64,
    pub torso_pitch: f64,
}

impl HumanSample {
    fn from_fields(f: [f64; 9]) -> Self {
        Self {
            hip_pitch: f[0],
            hip_roll: f[1],
            knee: f[2],
            ankle_pitch: f[3],
            shoulder_pitch: f[4],
            shoulder_roll: f[5],
            shoulder_yaw: f[6],
            elbow: f[7],
            torso_pitch: f[8],
        }
    }

    fn fields(&self) -> [f64; 9] {
        [
            self.hip_pitch,
            self.hip_roll,
            self.knee,
            self.ankle_pitch,
            self.shoulder_pitch,
            self.shoulder_roll,
            self.shoulder_yaw,
            self.elbow,
            self.torso_pitch,
        ]
    }
}

/// Per-tick samples of the nine human channels.
#[derive(Clone, Debug, PartialEq)]
pub struct ReducedHumanTrajectory {
    tick_count: usize,
    channels: [Vec<f64>; 9],
}

impl ReducedHumanTrajectory {
    /// Build a trajectory from in-memory samples, one per tick.
    pub fn from_samples(samples: &[HumanSample]) -> Self {
        let mut channels: [Vec<f64>; 9] = Default::default();
        for ch in channels.iter_mut() {
            ch.reserve_exact(samples.len());
        }
        for sample in samples {
            for (ch, value) in channels.iter_mut().zip(sample.fields()) {
                ch.push(value);
            }
        }
        Self {
            tick_count: samples.len(),
            channels,
        }
    }

    pub fn tick_count(&self) -> usize {
        self.tick_count
    }

    pub fn is_empty(&self) -> bool {
        self.tick_count == 0
    }

    pub fn channel(&self, channel: HumanChannel) -> &[f64] {
        &self.channels[channel.index()]
    }

    /// The sample at tick `t`, or `None` past the end.
    pub fn sample(&self, t: usize) -> Option<HumanSample> {
        if t >= self.tick_count {
            return None;
        }
        let mut fields = [0.0; 9];
        for (slot, ch) in fields.iter_mut().zip(self.channels.iter()) {
            *slot = ch[t];
        }
        Some(HumanSample::from_fields(fields))
    }
}

/// Number of floating-base fields leading each full-recording line.
pub const FLOATING_BASE_FIELDS: usize = 7;

/// Joint columns of a full recording, in file order, after the floating base.
pub const FULL_COLUMNS: [(&str, LimbGroup, usize); 17] = [
    ("torso_yaw", LimbGroup::Torso, 0),
    ("l_elbow", LimbGroup::LeftArm, 3),
    ("l_wrist_prosup", LimbGroup::LeftArm, 4),
    ("l_wrist_yaw", LimbGroup::LeftArm, 6),
    ("l_shoulder_pitch", LimbGroup::LeftArm, 0),
    ("l_shoulder_roll", LimbGroup::LeftArm, 1),
    ("l_shoulder_yaw", LimbGroup::LeftArm, 2),
    ("l_wrist_pitch", LimbGroup::LeftArm, 5),
    ("r_elbow", LimbGroup::RightArm, 3),
    ("r_wrist_prosup", LimbGroup::RightArm, 4),
    ("r_wrist_yaw", LimbGroup::RightArm, 6),
    ("r_shoulder_pitch", LimbGroup::RightArm, 0),
    ("r_shoulder_roll", LimbGroup::RightArm, 1),
    ("r_shoulder_yaw", LimbGroup::RightArm, 2),
    ("r_wrist_pitch", LimbGroup::RightArm, 5),
    ("torso_pitch", LimbGroup::Torso, 2),
    ("torso_roll", LimbGroup::Torso, 1),
];

const FULL_FIELDS: usize = FLOATING_BASE_FIELDS + FULL_COLUMNS.len();
const REDUCED_FIELDS: usize = 1 + HumanChannel::ALL.len();

/// Load a full robot-space recording.
///
/// Arm and torso series come from the file. The format has no leg columns,
/// so the leg series are zero and reported as unrecorded.
pub fn load_full_trajectory(path: impl AsRef<Path>) -> Result<Trajectory, PlayerError> {
    let path = path.as_ref();
    let mut reader = open(path)?;
    let tick_count = count_ticks(&mut reader, path)?;

    let mut trajectory = Trajectory::zeros(tick_count);
    trajectory.recorded = LimbGroup::ALL.map(|g| !g.is_leg());

    for_each_row::<FULL_FIELDS>(&mut reader, path, tick_count, |t, fields| {
        // fields[..FLOATING_BASE_FIELDS] is the floating base, unused
        let joints = &fields[FLOATING_BASE_FIELDS..];
        for (&(_, group, joint), &value) in FULL_COLUMNS.iter().zip(joints) {
            trajectory.series_mut(group).row_mut(t)[joint] = value;
        }
    })?;

    tracing::info!("{}: full recording of {} ticks", path.display(), tick_count);
    Ok(trajectory)
}

/// Load a reduced human recording.
pub fn load_reduced_trajectory(
    path: impl AsRef<Path>,
) -> Result<ReducedHumanTrajectory, PlayerError> {
    let path = path.as_ref();
    let mut reader = open(path)?;
    let tick_count = count_ticks(&mut reader, path)?;

    let mut channels: [Vec<f64>; 9] = Default::default();
    for ch in channels.iter_mut() {
        ch.resize(tick_count, 0.0);
    }

    for_each_row::<REDUCED_FIELDS>(&mut reader, path, tick_count, |t, fields| {
        // fields[0] is the recorder's frame counter
        for (ch, &value) in channels.iter_mut().zip(&fields[1..]) {
            ch[t] = value;
        }
    })?;

    tracing::info!("{}: human recording of {} ticks", path.display(), tick_count);
    for (ch, values) in HumanChannel::ALL.iter().zip(&channels) {
        let lo = values.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        tracing::debug!("  {:<14} [{:.2}, {:.2}]", ch.name(), lo, hi);
    }
    Ok(ReducedHumanTrajectory {
        tick_count,
        channels,
    })
}

fn open(path: &Path) -> Result<BufReader<File>, PlayerError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|source| PlayerError::File {
            path: path.to_path_buf(),
            source,
        })
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> PlayerError + '_ {
    move |source| PlayerError::File {
        path: path.to_path_buf(),
        source,
    }
}

/// First pass: count lines, then rewind for the second pass.
fn count_ticks(reader: &mut BufReader<File>, path: &Path) -> Result<usize, PlayerError> {
    let mut ticks = 0usize;
    let mut line = String::new();
    loop {
        line.clear();
        let n = reader.read_line(&mut line).map_err(io_error(path))?;
        if n == 0 {
            break;
        }
        ticks += 1;
    }
    if ticks == 0 {
        return Err(PlayerError::EmptyFile {
            path: path.to_path_buf(),
        });
    }
    reader.rewind().map_err(io_error(path))?;
    Ok(ticks)
}

/// Second pass: parse exactly `tick_count` lines of at least `N` fields.
fn for_each_row<const N: usize>(
    reader: &mut BufReader<File>,
    path: &Path,
    tick_count: usize,
    mut f: impl FnMut(usize, &[f64; N]),
) -> Result<(), PlayerError> {
    let mut line = String::new();
    for t in 0..tick_count {
        line.clear();
        let n = reader.read_line(&mut line).map_err(io_error(path))?;
        if n == 0 {
            // file shrank between passes
            return Err(PlayerError::parse(path, t + 1, 1, "unexpected end of file"));
        }
        let fields = parse_fields::<N>(&line, path, t + 1)?;
        f(t, &fields);
    }
    Ok(())
}

fn parse_fields<const N: usize>(
    line: &str,
    path: &Path,
    line_no: usize,
) -> Result<[f64; N], PlayerError> {
    let mut out = [0.0; N];
    let mut tokens = line.split_whitespace();
    for (i, slot) in out.iter_mut().enumerate() {
        let column = i + 1;
        let token = tokens.next().ok_or_else(|| {
            PlayerError::parse(
                path,
                line_no,
                column,
                format!("missing field (expected {} fields)", N),
            )
        })?;
        let value: f64 = token.parse().map_err(|_| {
            PlayerError::parse(path, line_no, column, format!("invalid number `{}`", token))
        })?;
        if !value.is_finite() {
            return Err(PlayerError::parse(
                path,
                line_no,
                column,
                format!("non-finite value `{}`", token),
            ));
        }
        *slot = value;
    }
    Ok(out)
}
