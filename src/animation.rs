//! Keyframe clips and playback.

use glam::{Quat, Vec3};

use crate::error::ConfigurationError;
use crate::scene::{AccessorType, AnimationPath, Interpolation, Scene, Transform};

/// One animated property of one node.
#[derive(Clone, Debug, PartialEq)]
pub struct Channel {
    pub node: usize,
    pub path: AnimationPath,
    pub interpolation: Interpolation,
    times: Vec<f32>,
    /// Keyframe values, `width` floats each. Cubic splines store
    /// (in-tangent, value, out-tangent) per keyframe.
    values: Vec<f32>,
    width: usize,
}

impl Channel {
    pub fn start(&self) -> f32 {
        self.times.first().copied().unwrap_or(0.0)
    }

    pub fn end(&self) -> f32 {
        self.times.last().copied().unwrap_or(0.0)
    }

    /// Floats per sampled value: 3 for translation and scale, 4 for rotation,
    /// the morph target count for weights.
    pub fn width(&self) -> usize {
        self.width
    }

    fn element(&self, key: usize, part: usize) -> &[f32] {
        let stride = match self.interpolation {
            Interpolation::CubicSpline => 3,
            _ => 1,
        };
        let start = (key * stride + part) * self.width;
        &self.values[start..start + self.width]
    }

    fn value(&self, key: usize) -> &[f32] {
        match self.interpolation {
            Interpolation::CubicSpline => self.element(key, 1),
            _ => self.element(key, 0),
        }
    }

    /// Samples the channel at `time`, holding the first and last keyframes
    /// outside of the keyed range.
    pub fn sample(&self, time: f32) -> Vec<f32> {
        let last = self.times.len() - 1;
        if time <= self.times[0] || last == 0 {
            return self.value(0).to_vec();
        }
        if time >= self.times[last] {
            return self.value(last).to_vec();
        }
        let key = self
            .times
            .partition_point(|&t| t <= time)
            .saturating_sub(1)
            .min(last - 1);
        let next = key + 1;
        let (t0, t1) = (self.times[key], self.times[next]);
        let dt = t1 - t0;
        let u = if dt > 0.0 { (time - t0) / dt } else { 0.0 };

        let mut sampled = match self.interpolation {
            Interpolation::Step => self.value(key).to_vec(),
            Interpolation::Linear if self.path == AnimationPath::Rotation => {
                let a = Quat::from_slice(self.value(key));
                let b = Quat::from_slice(self.value(next));
                a.slerp(b, u).to_array().to_vec()
            }
            Interpolation::Linear => self
                .value(key)
                .iter()
                .zip(self.value(next))
                .map(|(a, b)| a + (b - a) * u)
                .collect(),
            Interpolation::CubicSpline => {
                let (u2, u3) = (u * u, u * u * u);
                let v0 = self.element(key, 1);
                let b0 = self.element(key, 2);
                let a1 = self.element(next, 0);
                let v1 = self.element(next, 1);
                (0..self.width)
                    .map(|i| {
                        (2.0 * u3 - 3.0 * u2 + 1.0) * v0[i]
                            + (u3 - 2.0 * u2 + u) * dt * b0[i]
                            + (-2.0 * u3 + 3.0 * u2) * v1[i]
                            + (u3 - u2) * dt * a1[i]
                    })
                    .collect()
            }
        };
        if self.path == AnimationPath::Rotation {
            let rotation = Quat::from_slice(&sampled).normalize();
            sampled = rotation.to_array().to_vec();
        }
        sampled
    }
}

/// A scene animation with its keyframes read out of the accessors.
#[derive(Clone, Debug, PartialEq)]
pub struct Clip {
    pub name: Option<String>,
    pub channels: Vec<Channel>,
    duration: f32,
}

impl Clip {
    /// Reads animation `index` of `scene`, checking that every channel's
    /// keyframe counts line up.
    pub fn from_scene(scene: &Scene, index: usize) -> Result<Clip, ConfigurationError> {
        let animation = scene
            .animations
            .get(index)
            .ok_or(ConfigurationError::UnknownAnimation(index))?;
        let mut channels = Vec::with_capacity(animation.channels.len());
        for (channel_index, channel) in animation.channels.iter().enumerate() {
            let malformed = ConfigurationError::MalformedAnimation {
                animation: index,
                channel: channel_index,
            };
            if channel.node >= scene.nodes.len() {
                return Err(ConfigurationError::DanglingIndex {
                    kind: "node",
                    index: channel.node,
                });
            }
            let input = scene
                .accessors
                .get(channel.input)
                .ok_or(ConfigurationError::DanglingIndex {
                    kind: "accessor",
                    index: channel.input,
                })?;
            if input.accessor_type != AccessorType::Scalar {
                return Err(ConfigurationError::UnexpectedAccessorType {
                    accessor: channel.input,
                });
            }
            let times = scene.read_f32(channel.input)?;
            let values = scene.read_f32(channel.output)?;
            let unordered = times.windows(2).any(|pair| pair[1] < pair[0]);
            if times.is_empty() || unordered || times.iter().any(|t| !t.is_finite()) {
                return Err(malformed);
            }

            let per_key = match channel.interpolation {
                Interpolation::CubicSpline => 3 * times.len(),
                _ => times.len(),
            };
            if values.is_empty() || values.len() % per_key != 0 {
                return Err(malformed);
            }
            let width = values.len() / per_key;
            let expected = match channel.path {
                AnimationPath::Translation | AnimationPath::Scale => Some(3),
                AnimationPath::Rotation => Some(4),
                AnimationPath::Weights => None,
            };
            if expected.is_some_and(|expected| expected != width) {
                return Err(malformed);
            }

            channels.push(Channel {
                node: channel.node,
                path: channel.path,
                interpolation: channel.interpolation,
                times,
                values,
                width,
            });
        }
        let duration = channels.iter().map(Channel::end).fold(0.0, f32::max);
        Ok(Clip {
            name: animation.name.clone(),
            channels,
            duration,
        })
    }

    /// The largest keyframe time of any channel.
    pub fn duration(&self) -> f32 {
        self.duration
    }

    /// Writes the clip's values at `time` into `pose`.
    pub fn apply(&self, time: f32, pose: &mut Pose) {
        for channel in &self.channels {
            let value = channel.sample(time);
            let Some(transform) = pose.transforms.get_mut(channel.node) else {
                continue;
            };
            match channel.path {
                AnimationPath::Translation => transform.translation = Vec3::from_slice(&value),
                AnimationPath::Rotation => transform.rotation = Quat::from_slice(&value),
                AnimationPath::Scale => transform.scale = Vec3::from_slice(&value),
                AnimationPath::Weights => pose.weights[channel.node] = Some(value),
            }
        }
    }
}

/// Local node transforms and morph weights for one frame.
#[derive(Clone, Debug, PartialEq)]
pub struct Pose {
    pub transforms: Vec<Transform>,
    /// Animated morph weights per node; `None` falls back to the node's and
    /// then the mesh's defaults.
    pub weights: Vec<Option<Vec<f32>>>,
}

impl Pose {
    /// The scene's rest pose.
    pub fn rest(scene: &Scene) -> Pose {
        Pose {
            transforms: scene.nodes.iter().map(|node| node.transform).collect(),
            weights: vec![None; scene.nodes.len()],
        }
    }
}

/// Playback state of one animation on one instance.
#[derive(Clone, Debug, PartialEq)]
pub struct Player {
    animation: usize,
    time: f32,
    duration: f32,
    finished: bool,
    /// Wrap around at the end instead of holding the last frame.
    pub looping: bool,
    /// Seconds of animation per second of wall time. Negative plays backwards.
    pub speed: f32,
}

impl Player {
    pub fn new(animation: usize, duration: f32) -> Player {
        Player {
            animation,
            time: 0.0,
            duration: duration.max(0.0),
            finished: false,
            looping: true,
            speed: 1.0,
        }
    }

    pub fn animation(&self) -> usize {
        self.animation
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn duration(&self) -> f32 {
        self.duration
    }

    /// True once a non-looping player has reached the end it plays towards.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Jumps to `time`, wrapped or clamped like [`Player::advance`] would.
    pub fn seek(&mut self, time: f32) {
        self.finished = false;
        self.set_time(time);
    }

    /// Moves the clock by `elapsed * speed`. A finished one-shot player stays
    /// put until it loops again or seeks.
    pub fn advance(&mut self, elapsed: f32) {
        if self.finished && !self.looping {
            return;
        }
        self.set_time(self.time + elapsed * self.speed);
    }

    fn set_time(&mut self, time: f32) {
        if self.duration <= 0.0 {
            self.time = 0.0;
            self.finished = !self.looping;
        } else if self.looping {
            self.time = time.rem_euclid(self.duration);
            self.finished = false;
        } else {
            self.time = time.clamp(0.0, self.duration);
            self.finished = (self.speed >= 0.0 && time >= self.duration)
                || (self.speed < 0.0 && time <= 0.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel(path: AnimationPath, interpolation: Interpolation, times: &[f32], values: &[f32]) -> Channel {
        let per_key = match interpolation {
            Interpolation::CubicSpline => 3 * times.len(),
            _ => times.len(),
        };
        Channel {
            node: 0,
            path,
            interpolation,
            times: times.to_vec(),
            values: values.to_vec(),
            width: values.len() / per_key,
        }
    }

    #[test]
    fn looping_player_wraps() {
        let mut player = Player::new(0, 2.0);
        player.advance(2.5);
        assert_eq!(player.time(), 0.5);
        assert!(!player.is_finished());
    }

    #[test]
    fn one_shot_player_clamps() {
        let mut player = Player::new(0, 2.0);
        player.looping = false;
        player.advance(3.0);
        assert_eq!(player.time(), 2.0);
        assert!(player.is_finished());
        player.advance(1.0);
        assert_eq!(player.time(), 2.0);
    }

    #[test]
    fn finished_player_resumes_when_looped() {
        let mut player = Player::new(0, 2.0);
        player.looping = false;
        player.advance(3.0);
        assert!(player.is_finished());

        player.looping = true;
        player.advance(0.5);
        assert_eq!(player.time(), 0.5);
        assert!(!player.is_finished());
    }

    #[test]
    fn nan_time_samples_without_panicking() {
        let linear = channel(
            AnimationPath::Translation,
            Interpolation::Linear,
            &[0.0, 1.0, 2.0],
            &[0.0; 9],
        );
        assert_eq!(linear.sample(f32::NAN).len(), 3);
    }

    #[test]
    fn backwards_playback() {
        let mut player = Player::new(0, 2.0);
        player.speed = -1.0;
        player.advance(0.5);
        assert_eq!(player.time(), 1.5);

        player.looping = false;
        player.seek(0.25);
        player.advance(1.0);
        assert_eq!(player.time(), 0.0);
        assert!(player.is_finished());
    }

    #[test]
    fn speed_scales_elapsed_time() {
        let mut player = Player::new(0, 4.0);
        player.speed = 2.0;
        player.advance(0.75);
        assert_eq!(player.time(), 1.5);
    }

    #[test]
    fn linear_and_step_sampling() {
        let times = [0.0, 1.0, 3.0];
        let values = [0.0, 0.0, 0.0, 2.0, 4.0, 6.0, 2.0, 4.0, 6.0];
        let linear = channel(AnimationPath::Translation, Interpolation::Linear, &times, &values);
        assert_eq!(linear.sample(0.5), vec![1.0, 2.0, 3.0]);
        assert_eq!(linear.sample(-1.0), vec![0.0, 0.0, 0.0]);
        assert_eq!(linear.sample(10.0), vec![2.0, 4.0, 6.0]);

        let step = channel(AnimationPath::Translation, Interpolation::Step, &times, &values);
        assert_eq!(step.sample(0.99), vec![0.0, 0.0, 0.0]);
        assert_eq!(step.sample(1.0), vec![2.0, 4.0, 6.0]);
    }

    #[test]
    fn rotations_slerp_to_unit_quaternions() {
        let quarter = Quat::from_rotation_y(std::f32::consts::FRAC_PI_2);
        let mut values = Quat::IDENTITY.to_array().to_vec();
        values.extend(quarter.to_array());
        let rotation = channel(AnimationPath::Rotation, Interpolation::Linear, &[0.0, 1.0], &values);
        let halfway = Quat::from_slice(&rotation.sample(0.5));
        let expected = Quat::from_rotation_y(std::f32::consts::FRAC_PI_4);
        assert!(halfway.abs_diff_eq(expected, 1e-5));
        assert!((halfway.length() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn cubic_spline_hits_keyframes_and_uses_tangents() {
        // One weight, flat tangents: a smoothstep from 0 to 1.
        let values = [0.0, 0.0, 0.0, 0.0, 1.0, 0.0];
        let spline = channel(AnimationPath::Weights, Interpolation::CubicSpline, &[0.0, 1.0], &values);
        assert_eq!(spline.width(), 1);
        assert_eq!(spline.sample(0.0), vec![0.0]);
        assert_eq!(spline.sample(0.5), vec![0.5]);
        assert_eq!(spline.sample(1.0), vec![1.0]);
        assert!(spline.sample(0.25)[0] < 0.25);
    }
}
